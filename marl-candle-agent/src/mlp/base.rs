use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::RecurrentSubModel;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
///
/// Used as a feed-forward value network: the hidden state is passed through
/// unchanged.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl RecurrentSubModel for Mlp {
    type Config = MlpConfig;

    fn forward(&self, xs: &Tensor, hidden: Option<&Tensor>) -> Result<(Tensor, Option<Tensor>)> {
        let xs = xs.to_device(&self.device)?;
        let xs = mlp_forward(&xs, &self.layers, self.config.activation_out)?;
        Ok((xs, hidden.cloned()))
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config.dims())?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}
