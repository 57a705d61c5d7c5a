use super::PolicyOutput;
use crate::{
    actor_critic::ActorCriticModel,
    util::{avail_mask, check_dims, mask_logits, normal_log_density, standard_normal},
};
use anyhow::{anyhow, Result};
use candle_core::{DType, Tensor, D};
use candle_nn::ops::{log_softmax, softmax};
use log::trace;
use marl_core::{error::MarlError, Status};
use rand::{distributions::WeightedIndex, rngs::SmallRng, Rng, SeedableRng};

/// Actions chosen for every agent of a batch.
#[derive(Debug, Clone)]
pub struct SelectedAction {
    /// One-hot actions `(batch, n_agents, n_actions)` or action vectors
    /// `(batch, n_agents, act_dim)`. Detached from the computation graph.
    pub actions: Tensor,

    /// Actions fed to the critic. Equal to `actions` for discrete actions;
    /// continuous actions of unavailable agents are zeroed out.
    pub restored_actions: Tensor,

    /// Per-slot log-probabilities (discrete) or per-dimension log densities
    /// (continuous) of `actions`, with the same shape.
    pub log_prob: Tensor,

    /// Policy output the actions were drawn from. Discrete logits are masked.
    pub action_out: PolicyOutput,
}

/// Draws actions from policy outputs with an explicitly seeded generator.
///
/// Holding the generator here makes action selection, and everything built on
/// it, reproducible from a single seed.
pub struct ActionSelector {
    rng: SmallRng,
    epsilon_softmax: Option<f64>,
}

impl ActionSelector {
    /// Creates a selector seeded with `seed`.
    ///
    /// With `epsilon_softmax`, sampled discrete actions are drawn from
    /// `(1 - eps) * softmax + eps * uniform` over the available actions.
    pub fn new(seed: u64, epsilon_softmax: Option<f64>) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            epsilon_softmax,
        }
    }

    /// Resets the generator.
    pub fn seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Mutable access to the generator.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Runs the policy of `model` on `obs` and selects actions.
    pub fn act<M: ActorCriticModel>(
        &mut self,
        model: &M,
        obs: &Tensor,
        status: Status,
        exploration: bool,
        avail: &Tensor,
    ) -> Result<SelectedAction> {
        let output = model.policy(obs)?;
        self.select(&output, status, exploration, avail)
    }

    /// Selects actions from a policy output unfolded per agent.
    ///
    /// Actions are sampled only when `status` is [`Status::Train`] and
    /// `exploration` is `true`; otherwise the greedy action (argmax or mean)
    /// is returned.
    ///
    /// * `avail` - Availability of discrete actions, `(batch, n_agents, n_actions)`.
    ///   For continuous actions it may also be `(batch, n_agents, 1)` and
    ///   marks whole agents as unavailable.
    pub fn select(
        &mut self,
        output: &PolicyOutput,
        status: Status,
        exploration: bool,
        avail: &Tensor,
    ) -> Result<SelectedAction> {
        let sample = status == Status::Train && exploration;

        match output {
            PolicyOutput::Discrete { logits } => {
                let masked = mask_logits(logits, avail)?;
                let actions = match sample {
                    true => self.sample_categorical(&masked, avail)?,
                    false => greedy_one_hot(&masked)?,
                };
                let log_prob = (log_softmax(&masked, D::Minus1)? * &actions)?;
                let restored_actions = actions.clone();

                Ok(SelectedAction {
                    actions,
                    restored_actions,
                    log_prob,
                    action_out: PolicyOutput::Discrete { logits: masked },
                })
            }
            PolicyOutput::Continuous { .. } => {
                let (means, log_stds) = output.gaussian_params()?;
                let (b, n, d) = means.dims3()?;
                let (b_, n_, k) = avail.dims3()?;
                if (b_, n_) != (b, n) || (k != 1 && k != d) {
                    return Err(
                        MarlError::shape("actions_avail vs means", &[b, n, d], avail.dims()).into(),
                    );
                }
                let actions = match sample {
                    true => self.gaussian(&means, &log_stds)?,
                    false => means.detach(),
                };
                let log_prob = normal_log_density(&actions, &means, &log_stds)?;
                let restored_actions = actions.broadcast_mul(&avail_mask(avail)?)?;

                Ok(SelectedAction {
                    actions,
                    restored_actions,
                    log_prob,
                    action_out: output.clone(),
                })
            }
        }
    }

    /// Returns `means + exp(log_stds) * z` with `z ~ N(0, 1)`, detached.
    pub fn gaussian(&mut self, means: &Tensor, log_stds: &Tensor) -> Result<Tensor> {
        check_dims("log_stds vs means", log_stds, means.dims())?;
        let z = standard_normal(&mut self.rng, means.elem_count());
        let z = Tensor::from_vec(z, means.dims(), means.device())?;
        Ok((means + (log_stds.exp()? * z)?)?.detach())
    }

    /// Samples one-hot actions from masked logits `(batch, n_agents, n_actions)`.
    fn sample_categorical(&mut self, masked: &Tensor, avail: &Tensor) -> Result<Tensor> {
        let (b, n, a) = masked.dims3()?;
        let probs = softmax(masked, D::Minus1)?
            .reshape((b * n, a))?
            .to_vec2::<f32>()?;
        let avail = avail_mask(avail)?.reshape((b * n, a))?.to_vec2::<f32>()?;
        let mut one_hot = vec![0f32; b * n * a];

        for (row, (p, m)) in probs.into_iter().zip(avail.iter()).enumerate() {
            let p = match self.epsilon_softmax {
                None => p,
                Some(eps) => {
                    let n_avail = m.iter().sum::<f32>();
                    match n_avail > 0.0 {
                        true => p
                            .iter()
                            .zip(m.iter())
                            .map(|(p, m)| (1.0 - eps as f32) * p + eps as f32 * m / n_avail)
                            .collect(),
                        false => p,
                    }
                }
            };
            let dist = WeightedIndex::new(&p)
                .map_err(|e| anyhow!("Invalid action probabilities {:?}: {}", p, e))?;
            let ix = self.rng.sample(dist);
            one_hot[row * a + ix] = 1.0;
        }
        trace!("Sampled {} discrete actions", b * n);

        Ok(Tensor::from_vec(one_hot, (b, n, a), masked.device())?)
    }
}

/// One-hot encoding of the argmax over the last axis.
fn greedy_one_hot(logits: &Tensor) -> Result<Tensor> {
    let a = logits.dim(D::Minus1)?;
    let ix = logits.argmax_keepdim(D::Minus1)?;
    let range = Tensor::arange(0u32, a as u32, logits.device())?;
    Ok(ix.broadcast_eq(&range)?.to_dtype(DType::F32)?)
}
