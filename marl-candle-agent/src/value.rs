//! Assembly of value-network inputs.
//!
//! A [`ValueEstimator`] decides what the shared critic sees for every agent.
//! The critic itself is an ordinary network applied row-wise to
//! `(rows, in_dim)` inputs; estimators fold the agent axis into the rows and
//! unfold the outputs back to `(lead, n_agents, out_dim)`.
mod centralized;
mod decentralized;
use crate::{
    model::{ModelConfig, RecurrentSubModel},
    util::Critic,
};
use anyhow::Result;
pub use centralized::CentralizedValue;
use candle_core::Tensor;
pub use decentralized::DecentralizedValue;

/// Builds per-agent inputs of a value network and runs it.
pub trait ValueEstimator {
    /// Number of agents.
    fn n_agents(&self) -> usize;

    /// Input dimension required of the value network.
    fn in_dim(&self) -> usize;

    /// Output dimension required of the value network.
    fn out_dim(&self) -> usize;

    /// Returns inputs `(lead * n_agents, in_dim)` and the leading size `lead`.
    ///
    /// * `obs` - Observations `(batch, n_agents, obs_dim)`.
    /// * `act` - Joint actions; ignored by estimators that see observations only.
    fn assemble(&self, obs: &Tensor, act: &Tensor) -> Result<(Tensor, usize)>;

    /// Returns the outputs of `critic`, `(lead, n_agents, out_dim)`.
    fn value<V>(&self, critic: &Critic<V>, obs: &Tensor, act: &Tensor) -> Result<Tensor>
    where
        V: RecurrentSubModel,
        V::Config: ModelConfig,
    {
        let (inputs, lead) = self.assemble(obs, act)?;
        let (ys, _) = critic.forward(&inputs, None)?;
        Ok(ys.reshape((lead, self.n_agents(), self.out_dim()))?)
    }
}
