//! PPO losses.
use super::PpoConfig;
use crate::{
    action::{ActionSelector, PolicyOutput},
    actor_critic::ActorCriticModel,
    loss::{masked_log_prob, value_loss},
    returns::{advantages, compute_returns},
    util::{check_dims, mask_logits, normal_log_density, select_values},
    Losses, MarlBatch,
};
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::ops::log_softmax;
use log::{debug, trace};
use marl_core::{error::MarlError, Configurable, Status};

/// Clipped surrogate policy loss and (optionally clipped) value loss.
#[derive(Debug, Clone)]
pub struct Ppo {
    clip_epsilon: f64,
    clip_value: bool,
}

impl Configurable for Ppo {
    type Config = PpoConfig;

    fn build(config: Self::Config) -> Result<Self> {
        if !(config.clip_epsilon > 0.0) {
            return Err(MarlError::InvalidConfig(format!(
                "clip_epsilon must be positive, got {}",
                config.clip_epsilon
            ))
            .into());
        }
        Ok(Self {
            clip_epsilon: config.clip_epsilon,
            clip_value: config.clip_value,
        })
    }
}

impl Ppo {
    /// Computes PPO losses of `model` on a batch.
    ///
    /// Next actions are drawn by `selector` from the policy of `target` if
    /// given, else of `model`, and next values come from the same network.
    /// `old_log_prob` and `old_values` of the batch are those recorded when
    /// the transitions were collected.
    pub fn get_loss<M: ActorCriticModel>(
        &self,
        batch: &MarlBatch,
        model: &M,
        target: Option<&M>,
        selector: &mut ActionSelector,
        gamma: f64,
        normalize_advantages: bool,
    ) -> Result<Losses> {
        let (state, actions, avail) = (batch.state(), batch.actions(), batch.actions_avail());

        let action_out = model.policy(state)?;
        let log_prob = match &action_out {
            PolicyOutput::Discrete { logits } => {
                check_dims("actions vs logits", actions, logits.dims())?;
                (log_softmax(&mask_logits(logits, avail)?, D::Minus1)? * actions)?
            }
            PolicyOutput::Continuous { .. } => {
                let (means, log_stds) = action_out.gaussian_params()?;
                normal_log_density(actions, &means, &log_stds)?
            }
        };
        let log_prob = masked_log_prob(&log_prob, avail)?;
        let old_log_prob = masked_log_prob(batch.old_log_prob(), avail)?.detach();
        check_dims("old_log_prob vs log_prob", &old_log_prob, log_prob.dims())?;
        debug!("log_prob: {:?}", log_prob.dims());

        let values = select_values(&model.value(state, actions)?, actions)?;
        let bootstrap = target.unwrap_or(model);
        let next = selector.act(bootstrap, batch.next_state(), Status::Train, true, avail)?;
        let next_values = select_values(
            &bootstrap.value(batch.next_state(), &next.restored_actions)?,
            &next.restored_actions,
        )?
        .detach();
        trace!("Computed values");

        let returns = compute_returns(
            batch.rewards(),
            &next_values,
            batch.done(),
            batch.last_step(),
            gamma,
        )?;
        let advantages = advantages(&returns, &values, normalize_advantages)?;
        let policy_loss = clipped_surrogate(&log_prob, &old_log_prob, &advantages, self.clip_epsilon)?;
        let value_loss = match self.clip_value {
            true => clipped_value_loss(&values, batch.old_values(), &returns, self.clip_epsilon)?,
            false => value_loss(&returns, &values)?,
        };
        trace!("Computed losses");

        Ok(Losses {
            policy_loss,
            value_loss,
            action_out,
        })
    }

    /// Clipping range.
    pub fn clip_epsilon(&self) -> f64 {
        self.clip_epsilon
    }
}

/// `-mean(min(ratio * adv, clamp(ratio, 1 - eps, 1 + eps) * adv))`.
fn clipped_surrogate(
    log_prob: &Tensor,
    old_log_prob: &Tensor,
    advantages: &Tensor,
    eps: f64,
) -> Result<Tensor> {
    check_dims("advantages vs log_prob", advantages, log_prob.dims())?;
    let ratio = (log_prob - old_log_prob)?.exp()?;
    let surr1 = (&ratio * advantages)?;
    let surr2 = (ratio.clamp(1.0 - eps, 1.0 + eps)? * advantages)?;
    Ok(surr1.minimum(&surr2)?.mean_all()?.neg()?)
}

/// `mean(max((v - R)^2, (v_clip - R)^2))` with
/// `v_clip = old + clamp(v - old, -eps, eps)`.
fn clipped_value_loss(
    values: &Tensor,
    old_values: &Tensor,
    returns: &Tensor,
    eps: f64,
) -> Result<Tensor> {
    check_dims("returns vs values", returns, values.dims())?;
    check_dims("old_values vs values", old_values, values.dims())?;
    let old_values = old_values.detach();
    let clipped = (&old_values + (values - &old_values)?.clamp(-eps, eps)?)?;
    let unclipped = (values - returns)?.sqr()?;
    let clipped = (clipped - returns)?.sqr()?;
    Ok(unclipped.maximum(&clipped)?.mean_all()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_clipped_surrogate() -> Result<()> {
        let d = &Device::Cpu;
        let log_prob = Tensor::from_slice(&[0f32, 2f32.ln()], (1, 2), d)?;
        let old = log_prob.zeros_like()?;

        let adv = Tensor::from_slice(&[1f32, 1.], (1, 2), d)?;
        let loss = clipped_surrogate(&log_prob, &old, &adv, 0.2)?.to_scalar::<f32>()?;
        assert!((loss + 1.1).abs() < 1e-5);

        // Negative advantages are not clipped from below
        let adv = adv.neg()?;
        let loss = clipped_surrogate(&log_prob, &old, &adv, 0.2)?.to_scalar::<f32>()?;
        assert!((loss - 1.5).abs() < 1e-5);

        assert!(clipped_surrogate(&log_prob, &old, &adv.reshape((2, 1))?, 0.2).is_err());
        Ok(())
    }

    #[test]
    fn test_clipped_value_loss() -> Result<()> {
        let d = &Device::Cpu;
        let values = Tensor::from_slice(&[1f32, 3.], (1, 2), d)?;
        let old = values.zeros_like()?;
        let returns = Tensor::from_slice(&[3f32, 0.], (1, 2), d)?;
        let loss = clipped_value_loss(&values, &old, &returns, 0.5)?.to_scalar::<f32>()?;
        assert!((loss - 7.625).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_build() -> Result<()> {
        let ppo = Ppo::build(PpoConfig::default())?;
        assert_eq!(ppo.clip_epsilon(), 0.2);
        assert!(Ppo::build(PpoConfig::default().clip_epsilon(0.0)).is_err());
        Ok(())
    }

    #[test]
    fn test_config_yaml() -> Result<()> {
        let config: PpoConfig = serde_yaml::from_str("clip_epsilon: 0.1\nclip_value: true\n")?;
        assert_eq!(config, PpoConfig::default().clip_epsilon(0.1).clip_value(true));
        Ok(())
    }
}
