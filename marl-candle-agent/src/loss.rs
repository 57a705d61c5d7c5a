//! Value and policy losses.
use crate::{
    action::PolicyOutput,
    util::{avail_mask, check_dims},
};
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::loss::mse;
use log::trace;
use marl_core::{
    error::MarlError,
    record::{Record, RecordValue},
};

/// Output of `get_loss`.
#[derive(Debug, Clone)]
pub struct Losses {
    /// Scalar policy loss.
    pub policy_loss: Tensor,

    /// Scalar value loss.
    pub value_loss: Tensor,

    /// Policy output on the batch observations, for diagnostics.
    pub action_out: PolicyOutput,
}

impl Losses {
    /// Returns the losses as scalars `loss_policy` and `loss_value`.
    pub fn to_record(&self) -> Result<Record> {
        Ok(Record::from_slice(&[
            (
                "loss_policy",
                RecordValue::Scalar(self.policy_loss.to_scalar::<f32>()?),
            ),
            (
                "loss_value",
                RecordValue::Scalar(self.value_loss.to_scalar::<f32>()?),
            ),
        ]))
    }
}

/// Mean squared error between values and returns, both `(batch, n_agents)`.
pub(crate) fn value_loss(returns: &Tensor, values: &Tensor) -> Result<Tensor> {
    check_dims("returns vs values", returns, values.dims())?;
    Ok(mse(values, returns)?)
}

/// Log-probability of the realized actions, `(batch, n_agents)`.
///
/// Per-slot log-probabilities `(batch, n_agents, k)` are multiplied by the
/// availability mask and summed over the last axis, so unavailable slots
/// contribute exactly zero. Rank-2 input is returned as is.
pub(crate) fn masked_log_prob(log_prob: &Tensor, avail: &Tensor) -> Result<Tensor> {
    match log_prob.rank() {
        2 => Ok(log_prob.clone()),
        _ => {
            let (b, n, k) = log_prob.dims3()?;
            match avail.dims3()? {
                (b_, n_, k_) if (b_, n_) == (b, n) && (k_ == k || k_ == 1) => {}
                _ => {
                    return Err(
                        MarlError::shape("actions_avail vs log_prob", &[b, n, k], avail.dims())
                            .into(),
                    )
                }
            }
            Ok(log_prob
                .broadcast_mul(&avail_mask(avail)?)?
                .sum(D::Minus1)?)
        }
    }
}

/// `-mean(advantages * masked log-probability)`.
pub(crate) fn policy_loss(advantages: &Tensor, log_prob: &Tensor, avail: &Tensor) -> Result<Tensor> {
    let log_prob = masked_log_prob(log_prob, avail)?;
    check_dims("log_prob vs advantages", &log_prob, advantages.dims())?;
    trace!("Policy loss over {:?}", advantages.dims());
    Ok((advantages * log_prob)?.mean_all()?.neg()?)
}
