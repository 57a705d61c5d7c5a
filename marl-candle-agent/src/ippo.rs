//! Independent proximal policy optimization (IPPO).
//!
//! Every agent runs PPO on its own observations with a decentralized critic.
//! Actor and critic parameters are shared across agents; one-hot agent
//! identifiers appended to the inputs let the shared networks tell agents
//! apart.
mod base;
mod config;
pub use base::Ippo;
pub use config::IppoConfig;
