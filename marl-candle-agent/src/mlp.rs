//! Multilayer perceptrons for actors and critics.
mod base;
mod config;
mod policy;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use policy::{PolicyMlp, PolicyMlpConfig};

/// Returns linear layers mapping `dims[i]` to `dims[i + 1]`, named `ln{i}`.
fn create_linear_layers(prefix: &str, vs: VarBuilder, dims: &[usize]) -> Result<Vec<Linear>> {
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| Ok(linear(w[0], w[1], vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Applies the layers with ReLU in between, and also after the last one
/// when `relu_out` is `true`.
fn mlp_forward(xs: &Tensor, layers: &[Linear], relu_out: bool) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs.clone();

    for (i, layer) in layers.iter().enumerate() {
        xs = layer.forward(&xs)?;
        if i + 1 < n_layers || relu_out {
            xs = xs.relu()?;
        }
    }

    Ok(xs)
}
