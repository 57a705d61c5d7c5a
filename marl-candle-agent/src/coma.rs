//! Counterfactual multi-agent policy gradients (COMA).
//!
//! A centralized critic values every agent with access to all observations
//! and actions, and each agent's policy gradient is weighted by its
//! counterfactual advantage: the value of the realized joint action minus the
//! expected value when only that agent's action is redrawn from its policy.
//!
//! ```no_run
//! use anyhow::Result;
//! use marl_candle_agent::{
//!     coma::{Coma, ComaConfig},
//!     mlp::{Mlp, MlpConfig, PolicyMlp, PolicyMlpConfig},
//!     util::{ActorConfig, CriticConfig},
//!     MarlBatch,
//! };
//! use marl_core::{ActionSpace, Configurable};
//!
//! fn train(batches: Vec<MarlBatch>) -> Result<()> {
//!     let (n, o, a) = (3, 4, 5);
//!     let config = ComaConfig::<PolicyMlp, Mlp>::default()
//!         .dims(n, o, a)
//!         .actor_config(ActorConfig::default().policy_config(PolicyMlpConfig::new(
//!             o + n,
//!             vec![64],
//!             a,
//!             ActionSpace::Discrete,
//!         )))
//!         .critic_config(CriticConfig::default().value_config(MlpConfig::new(
//!             (n + 1) * o + n + n * a,
//!             vec![64],
//!             a,
//!             false,
//!         )))
//!         .device(candle_core::Device::Cpu);
//!     let mut coma = Coma::build(config)?;
//!
//!     for batch in batches.iter() {
//!         let losses = coma.get_loss(batch)?;
//!         coma.backward_step(&losses)?;
//!         coma.soft_update_target()?;
//!     }
//!     Ok(())
//! }
//! ```
mod base;
mod config;
pub use base::Coma;
pub use config::ComaConfig;
