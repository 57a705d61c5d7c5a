//! Seeded parameter initialization.
use super::standard_normal;
use anyhow::{anyhow, Result};
use candle_core::Tensor;
use candle_nn::VarMap;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Initialization scheme of network parameters.
///
/// Parameters are always re-drawn from an explicitly seeded generator after
/// networks are built, so two agents with the same seed start identical.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy, Default)]
pub enum ParamInit {
    /// `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` for weights and biases, as in PyTorch.
    #[default]
    Uniform,

    /// Weights from `N(0, std^2)`, biases set to zero.
    Normal {
        /// Standard deviation of weights.
        std: f64,
    },
}

/// Re-initializes all variables of `varmap` in the order of their names.
pub fn initialize(varmap: &VarMap, init: &ParamInit, rng: &mut impl Rng) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("Failed to lock VarMap"))?;
    let mut names = data.keys().cloned().collect::<Vec<_>>();
    names.sort();

    for name in names.iter() {
        let var = &data[name];
        let dims = var.dims().to_vec();
        let numel = var.elem_count();
        let is_bias = name.ends_with("bias");
        let fan_in = match is_bias {
            true => data
                .get(&name.replace("bias", "weight"))
                .and_then(|w| w.dims().last().copied())
                .unwrap_or(numel),
            false => dims.last().copied().unwrap_or(1),
        }
        .max(1);

        let values: Vec<f32> = match init {
            ParamInit::Uniform => {
                let k = 1.0 / (fan_in as f32).sqrt();
                (0..numel).map(|_| rng.gen_range(-k..k)).collect()
            }
            ParamInit::Normal { std } => match is_bias {
                true => vec![0f32; numel],
                false => standard_normal(rng, numel)
                    .into_iter()
                    .map(|x| x * *std as f32)
                    .collect(),
            },
        };
        var.set(&Tensor::from_vec(values, dims.as_slice(), var.device())?)?;
        debug!("Initialized {} with fan_in = {}", name, fan_in);
    }

    Ok(())
}
