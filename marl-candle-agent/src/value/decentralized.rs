use super::ValueEstimator;
use crate::util::{agent_ids, check_dims};
use anyhow::Result;
use candle_core::{Tensor, D};

/// Decentralized critic input of IPPO.
///
/// Agent `i` is valued from its own observation and its one-hot identifier;
/// actions are ignored and the value network outputs a single state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecentralizedValue {
    n_agents: usize,
    obs_dim: usize,
}

impl DecentralizedValue {
    /// Creates the estimator.
    pub fn new(n_agents: usize, obs_dim: usize) -> Self {
        Self { n_agents, obs_dim }
    }
}

impl ValueEstimator for DecentralizedValue {
    fn n_agents(&self) -> usize {
        self.n_agents
    }

    fn in_dim(&self) -> usize {
        self.obs_dim + self.n_agents
    }

    fn out_dim(&self) -> usize {
        1
    }

    fn assemble(&self, obs: &Tensor, _act: &Tensor) -> Result<(Tensor, usize)> {
        let (n, o) = (self.n_agents, self.obs_dim);
        let b = obs.dim(0)?;
        check_dims("observations", obs, &[b, n, o])?;
        let ids = agent_ids(b, n, obs.device())?;
        let inputs = Tensor::cat(&[obs, &ids], D::Minus1)?.reshape((b * n, o + n))?;
        Ok((inputs, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_inputs() -> Result<()> {
        let est = DecentralizedValue::new(2, 1);
        let obs = Tensor::from_slice(&[5f32, 6., 7., 8.], (2, 2, 1), &Device::Cpu)?;
        let (inputs, lead) = est.assemble(&obs, &obs)?;
        assert_eq!(lead, 2);
        assert_eq!(
            inputs.to_vec2::<f32>()?,
            vec![
                vec![5., 1., 0.],
                vec![6., 0., 1.],
                vec![7., 1., 0.],
                vec![8., 0., 1.],
            ]
        );
        Ok(())
    }
}
