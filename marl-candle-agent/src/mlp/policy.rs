use super::{create_linear_layers, mlp_forward};
use crate::{
    action::PolicyOutput,
    model::SubModel1,
    util::{InDim, OutDim},
};
use anyhow::Result;
use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use marl_core::ActionSpace;
use serde::{Deserialize, Serialize};

fn default_min_log_std() -> f64 {
    -20.0
}

fn default_max_log_std() -> f64 {
    2.0
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`PolicyMlp`].
pub struct PolicyMlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    pub(super) action_space: ActionSpace,
    #[serde(default = "default_min_log_std")]
    pub(super) min_log_std: f64,
    #[serde(default = "default_max_log_std")]
    pub(super) max_log_std: f64,
}

impl PolicyMlpConfig {
    /// Creates configuration of a policy network.
    ///
    /// `out_dim` is the number of actions for discrete action spaces and the
    /// dimension of the action vector for continuous ones.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize, action_space: ActionSpace) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            action_space,
            min_log_std: default_min_log_std(),
            max_log_std: default_max_log_std(),
        }
    }

    /// Sets the range to which log standard deviations are clamped.
    pub fn log_std_range(mut self, min: f64, max: f64) -> Self {
        self.min_log_std = min;
        self.max_log_std = max;
        self
    }
}

impl OutDim for PolicyMlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}

impl InDim for PolicyMlpConfig {
    fn get_in_dim(&self) -> usize {
        self.in_dim
    }

    fn set_in_dim(&mut self, in_dim: usize) {
        self.in_dim = in_dim;
    }
}

/// Multilayer perceptron producing the parameters of a per-agent policy.
///
/// For discrete action spaces it outputs logits, for continuous ones a mean
/// and a clamped log standard deviation from two heads on a shared trunk.
pub struct PolicyMlp {
    config: PolicyMlpConfig,
    device: Device,
    layers: Vec<Linear>,
    head1: Linear,
    head2: Option<Linear>,
}

impl SubModel1 for PolicyMlp {
    type Config = PolicyMlpConfig;
    type Input = Tensor;
    type Output = PolicyOutput;

    fn forward(&self, xs: &Self::Input) -> Result<PolicyOutput> {
        let xs = xs.to_device(&self.device)?;
        let xs = mlp_forward(&xs, &self.layers, true)?;
        let ys = self.head1.forward(&xs)?;

        match &self.head2 {
            None => Ok(PolicyOutput::Discrete { logits: ys }),
            Some(head2) => {
                let log_stds = head2
                    .forward(&xs)?
                    .clamp(self.config.min_log_std, self.config.max_log_std)?;
                Ok(PolicyOutput::Continuous {
                    means: ys,
                    log_stds,
                })
            }
        }
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let mut dims = vec![config.in_dim];
        dims.extend(config.units.iter().copied());
        let layers = create_linear_layers("mlp", vs.clone(), &dims)?;
        let in_dim = *dims.last().unwrap_or(&config.in_dim);
        let (head1, head2) = match config.action_space {
            ActionSpace::Discrete => (linear(in_dim, config.out_dim, vs.pp("logits"))?, None),
            ActionSpace::Continuous => (
                linear(in_dim, config.out_dim, vs.pp("mean"))?,
                Some(linear(in_dim, config.out_dim, vs.pp("log_std"))?),
            ),
        };

        Ok(Self {
            config,
            device,
            layers,
            head1,
            head2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    fn build(action_space: ActionSpace) -> Result<PolicyMlp> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = PolicyMlpConfig::new(6, vec![16], 4, action_space).log_std_range(-1.0, 0.5);
        PolicyMlp::build(vb, config)
    }

    #[test]
    fn test_discrete_head() -> Result<()> {
        let pi = build(ActionSpace::Discrete)?;
        match pi.forward(&Tensor::ones((3, 6), DType::F32, &Device::Cpu)?)? {
            PolicyOutput::Discrete { logits } => assert_eq!(logits.dims(), &[3, 4]),
            _ => panic!("Expected discrete output"),
        }
        Ok(())
    }

    #[test]
    fn test_continuous_heads() -> Result<()> {
        let pi = build(ActionSpace::Continuous)?;
        let xs = Tensor::randn(0f32, 10f32, (3, 6), &Device::Cpu)?;
        match pi.forward(&xs)? {
            PolicyOutput::Continuous { means, log_stds } => {
                assert_eq!(means.dims(), &[3, 4]);
                let v = log_stds.flatten_all()?.to_vec1::<f32>()?;
                assert!(v.iter().all(|&x| (-1.0..=0.5).contains(&x)));
            }
            _ => panic!("Expected continuous output"),
        }
        Ok(())
    }
}
