//! Clipped surrogate objective of proximal policy optimization (PPO).
//!
//! [`Ppo`] does not own networks. It computes losses against any
//! [`ActorCriticModel`](crate::actor_critic::ActorCriticModel), which lets
//! independent PPO reuse it with shared per-agent networks.
mod base;
mod config;
pub use base::Ppo;
pub use config::PpoConfig;
