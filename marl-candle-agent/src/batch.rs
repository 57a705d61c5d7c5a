//! Batch of joint transitions.
use crate::util::check_dims;
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use marl_core::error::MarlError;

/// A batch of joint transitions of `n_agents` agents.
///
/// Row `t` of every tensor belongs to the same time step, and rows are
/// consecutive steps: returns are accumulated from the last row backwards.
///
/// | field | shape |
/// |---|---|
/// | `state`, `next_state` | `(batch, n_agents, obs_dim)` |
/// | `actions` | `(batch, n_agents, n_actions)` one-hot, or `(batch, n_agents, act_dim)` |
/// | `actions_avail` | same as `actions`; `(batch, n_agents, 1)` is also accepted for continuous actions |
/// | `rewards`, `old_values`, `old_next_values` | `(batch, n_agents)` |
/// | `old_log_prob` | `(batch, n_agents)` or the per-slot shape of `actions` |
/// | `done`, `last_step` | `batch` flags |
#[derive(Debug, Clone)]
pub struct MarlBatch {
    state: Tensor,
    actions: Tensor,
    old_log_prob: Tensor,
    old_values: Tensor,
    old_next_values: Tensor,
    rewards: Tensor,
    next_state: Tensor,
    done: Vec<bool>,
    last_step: Vec<bool>,
    actions_avail: Tensor,
}

impl MarlBatch {
    /// Creates a batch, checking the shapes of its fields.
    ///
    /// `old_log_prob`, `old_values` and `old_next_values` start as zeros
    /// and are set with the `with_*` builder methods.
    pub fn new(
        state: Tensor,
        actions: Tensor,
        rewards: Tensor,
        next_state: Tensor,
        done: Vec<bool>,
        last_step: Vec<bool>,
        actions_avail: Tensor,
    ) -> Result<Self> {
        let zeros = rewards.zeros_like()?;
        let batch = Self {
            state,
            actions,
            old_log_prob: zeros.clone(),
            old_values: zeros.clone(),
            old_next_values: zeros,
            rewards,
            next_state,
            done,
            last_step,
            actions_avail,
        };
        batch.validate()?;
        Ok(batch)
    }

    /// Sets log-probabilities of `actions` under the behavior policy.
    pub fn with_old_log_prob(mut self, v: Tensor) -> Result<Self> {
        self.old_log_prob = v;
        self.validate()?;
        Ok(self)
    }

    /// Sets values estimated when the transitions were collected.
    pub fn with_old_values(mut self, v: Tensor) -> Result<Self> {
        self.old_values = v;
        self.validate()?;
        Ok(self)
    }

    /// Sets next-state values estimated when the transitions were collected.
    pub fn with_old_next_values(mut self, v: Tensor) -> Result<Self> {
        self.old_next_values = v;
        self.validate()?;
        Ok(self)
    }

    /// Checks that all fields agree on the batch size and the number of agents.
    pub fn validate(&self) -> Result<()> {
        let (b, n, _) = self.state.dims3()?;
        check_dims("next_state vs state", &self.next_state, self.state.dims())?;
        check_dims("rewards", &self.rewards, &[b, n])?;
        check_dims("old_values", &self.old_values, &[b, n])?;
        check_dims("old_next_values", &self.old_next_values, &[b, n])?;

        let (b_, n_, a) = self.actions.dims3()?;
        if (b_, n_) != (b, n) {
            return Err(MarlError::shape("actions", &[b, n, a], self.actions.dims()).into());
        }
        match self.actions_avail.dims3()? {
            (b_, n_, k) if (b_, n_) == (b, n) && (k == a || k == 1) => {}
            _ => {
                return Err(
                    MarlError::shape("actions_avail", &[b, n, a], self.actions_avail.dims()).into(),
                )
            }
        }
        if self.old_log_prob.dims() != [b, n] {
            check_dims("old_log_prob", &self.old_log_prob, &[b, n, a])?;
        }
        if self.done.len() != b {
            return Err(MarlError::shape("done", &[b], &[self.done.len()]).into());
        }
        if self.last_step.len() != b {
            return Err(MarlError::shape("last_step", &[b], &[self.last_step.len()]).into());
        }
        Ok(())
    }

    /// Returns `(batch_size, n_agents)`.
    pub fn dims(&self) -> (usize, usize) {
        let dims = self.state.dims();
        (dims[0], dims[1])
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.dims().0
    }

    /// `true` if the batch holds no transition.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves all tensors to `device` as `f32`.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        let f = |t: &Tensor| -> Result<Tensor> { Ok(t.to_device(device)?.to_dtype(DType::F32)?) };
        Ok(Self {
            state: f(&self.state)?,
            actions: f(&self.actions)?,
            old_log_prob: f(&self.old_log_prob)?,
            old_values: f(&self.old_values)?,
            old_next_values: f(&self.old_next_values)?,
            rewards: f(&self.rewards)?,
            next_state: f(&self.next_state)?,
            done: self.done.clone(),
            last_step: self.last_step.clone(),
            actions_avail: f(&self.actions_avail)?,
        })
    }

    /// Observations.
    pub fn state(&self) -> &Tensor {
        &self.state
    }

    /// Actions taken.
    pub fn actions(&self) -> &Tensor {
        &self.actions
    }

    /// Log-probabilities of `actions` under the behavior policy.
    pub fn old_log_prob(&self) -> &Tensor {
        &self.old_log_prob
    }

    /// Values estimated when the transitions were collected.
    pub fn old_values(&self) -> &Tensor {
        &self.old_values
    }

    /// Next-state values estimated when the transitions were collected.
    pub fn old_next_values(&self) -> &Tensor {
        &self.old_next_values
    }

    /// Rewards.
    pub fn rewards(&self) -> &Tensor {
        &self.rewards
    }

    /// Next observations.
    pub fn next_state(&self) -> &Tensor {
        &self.next_state
    }

    /// Whether the episode ended at each step.
    pub fn done(&self) -> &[bool] {
        &self.done
    }

    /// Whether each step is the last of its trajectory segment.
    pub fn last_step(&self) -> &[bool] {
        &self.last_step
    }

    /// Availability of actions.
    pub fn actions_avail(&self) -> &Tensor {
        &self.actions_avail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(b: usize, n: usize, a: usize, flags: usize) -> Result<MarlBatch> {
        let d = &Device::Cpu;
        MarlBatch::new(
            Tensor::zeros((b, n, 4), DType::F32, d)?,
            Tensor::zeros((b, n, a), DType::F32, d)?,
            Tensor::zeros((b, n), DType::F32, d)?,
            Tensor::zeros((b, n, 4), DType::F32, d)?,
            vec![false; flags],
            vec![false; flags],
            Tensor::ones((b, n, a), DType::F32, d)?,
        )
    }

    #[test]
    fn test_validate() -> Result<()> {
        let batch = batch(4, 3, 5, 4)?;
        assert_eq!(batch.dims(), (4, 3));
        assert!(batch
            .clone()
            .with_old_log_prob(Tensor::zeros((4, 3, 5), DType::F32, &Device::Cpu)?)
            .is_ok());
        let err = batch
            .with_old_values(Tensor::zeros((4, 2), DType::F32, &Device::Cpu)?)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MarlError>(),
            Some(MarlError::ShapeMismatch { .. })
        ));

        let err = self::batch(4, 3, 5, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Shape mismatch (done): expected [4], got [3]"
        );
        Ok(())
    }
}
