//! Optimizers of the actor and the critic.
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};
use candle_optimisers::adam::{Adam, ParamsAdam};
use marl_core::error::MarlError;
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer owned by an actor or a critic.
///
/// ```yaml
/// AdamW:
///   lr: 0.0005
///   weight_decay: 0.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam with default moment decay rates.
    Adam { lr: f64 },

    /// AdamW, Adam with decoupled weight decay.
    AdamW {
        lr: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam { lr: 0.0005 }
    }
}

impl OptimizerConfig {
    /// Builds an optimizer over the parameters of one network.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        let inner = match *self {
            Self::Adam { lr } => Inner::Adam(Adam::new(
                vars,
                ParamsAdam {
                    lr,
                    ..ParamsAdam::default()
                },
            )?),
            Self::AdamW { lr, weight_decay } => Inner::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr,
                    weight_decay,
                    ..ParamsAdamW::default()
                },
            )?),
        };
        Ok(Optimizer { inner })
    }
}

enum Inner {
    Adam(Adam),
    AdamW(AdamW),
}

/// Updates the parameters of one network from a scalar loss.
pub struct Optimizer {
    inner: Inner,
}

impl Optimizer {
    /// Back-propagates `loss` and applies one update.
    ///
    /// Only the parameters given at construction move, even when the graph of
    /// `loss` reaches other networks. `loss` must be a scalar.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        if loss.rank() != 0 {
            return Err(MarlError::shape("loss", &[], loss.dims()).into());
        }
        match &mut self.inner {
            Inner::Adam(opt) => opt.backward_step(loss)?,
            Inner::AdamW(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }
}
