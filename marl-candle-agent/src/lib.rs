//! Multi-agent actor-critic losses implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! Two algorithms are provided, both exposing a single `get_loss` operation
//! that maps a [`MarlBatch`] of joint transitions to a policy loss and a value
//! loss:
//!
//! * [`coma::Coma`], counterfactual multi-agent policy gradients with a
//!   centralized critic and a per-agent counterfactual baseline.
//! * [`ippo::Ippo`], independent PPO with a decentralized critic, delegating its
//!   loss to the clipped surrogate objective in [`ppo::Ppo`].
//!
//! Tensors carry the batch dimension first and the agent dimension second,
//! i.e. observations are `(batch, n_agents, obs_dim)`.
pub mod action;
pub mod actor_critic;
mod baseline;
mod batch;
pub mod coma;
pub mod ippo;
mod loss;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod ppo;
pub mod returns;
pub mod util;
pub mod value;
use anyhow::Result;
pub use batch::MarlBatch;
pub use loss::Losses;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl From<&candle_core::Device> for Device {
    fn from(device: &candle_core::Device) -> Self {
        match device.location() {
            candle_core::DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            _ => Self::Cpu,
        }
    }
}

impl From<candle_core::Device> for Device {
    fn from(device: candle_core::Device) -> Self {
        Self::from(&device)
    }
}

impl Device {
    /// Opens the corresponding [`candle_core::Device`].
    ///
    /// Fails when a CUDA device is requested but unavailable.
    pub fn open(&self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(*n)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_conversion() -> Result<()> {
        let device = Device::Cpu.open()?;
        assert!(device.is_cpu());
        assert_eq!(Device::from(&device), Device::Cpu);
        assert_eq!(
            serde_yaml::from_str::<Device>(&serde_yaml::to_string(&Device::Cuda(1))?)?,
            Device::Cuda(1)
        );
        Ok(())
    }
}
