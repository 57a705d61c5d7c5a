//! COMA agent.
use super::ComaConfig;
use crate::{
    action::{ActionSelector, PolicyOutput, SelectedAction},
    actor_critic::{ActorCritic, ActorCriticModel, TargetNetwork},
    baseline::{discrete_baseline, monte_carlo_baseline},
    loss::{policy_loss, value_loss},
    model::{ModelConfig, RecurrentSubModel, SubModel1},
    returns::{advantages, compute_returns},
    util::{
        check_dims, mask_logits, normal_log_density, select_values, Actor, Critic, OutDim,
    },
    value::CentralizedValue,
    Losses, MarlBatch,
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::ops::log_softmax;
use log::{info, trace};
use marl_core::{error::MarlError, ActionSpace, Configurable, Status};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::path::Path;

type Model<P, V> = ActorCritic<P, V, CentralizedValue>;

/// Counterfactual multi-agent policy gradients (COMA) agent.
///
/// Holds the live actor-critic, an optional target copy used for
/// bootstrapping, and the seeded action selector.
pub struct Coma<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    live: Model<P, V>,
    target: Option<TargetNetwork<P, V, CentralizedValue>>,
    selector: ActionSelector,
    action_space: ActionSpace,
    gamma: f64,
    sample_size: usize,
    tau: f64,
    normalize_advantages: bool,
    device: Device,
}

impl<P, V> Coma<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    /// Computes the policy loss and the value loss on a batch.
    ///
    /// Parameters are not changed; pass the result to
    /// [`Coma::backward_step`] to train.
    pub fn get_loss(&mut self, batch: &MarlBatch) -> Result<Losses> {
        let batch = batch.to_device(&self.device)?;
        batch.validate()?;
        let (b, n) = batch.dims();
        let (state, actions, avail) = (batch.state(), batch.actions(), batch.actions_avail());
        let bootstrap = match &self.target {
            Some(target) => target.model(),
            None => &self.live,
        };

        let action_out = self.live.policy(state)?;
        action_out.expect_space(self.action_space)?;
        trace!("Evaluated policy on a batch of {} steps and {} agents", b, n);

        let (log_prob, values, baselines, next_values) = match &action_out {
            PolicyOutput::Discrete { logits } => {
                check_dims("actions vs logits", actions, logits.dims())?;
                let masked = mask_logits(logits, avail)?;
                let log_prob = (log_softmax(&masked, D::Minus1)? * actions)?;
                let next =
                    self.selector
                        .act(bootstrap, batch.next_state(), Status::Train, true, avail)?;
                let q = self.live.value(state, actions)?;
                let baselines = discrete_baseline(&q, &masked)?;
                let values = select_values(&q, actions)?;
                let next_q = bootstrap.value(batch.next_state(), &next.restored_actions)?;
                let next_values = select_values(&next_q, &next.restored_actions)?;
                (log_prob, values, baselines, next_values)
            }
            PolicyOutput::Continuous { .. } => {
                let (means, log_stds) = action_out.gaussian_params()?;
                let log_prob = normal_log_density(actions, &means, &log_stds)?;
                let next =
                    self.selector
                        .act(bootstrap, batch.next_state(), Status::Train, true, avail)?;
                let baselines = monte_carlo_baseline(
                    &self.live,
                    &mut self.selector,
                    state,
                    actions,
                    &means,
                    &log_stds,
                    self.sample_size,
                )?;
                let values = select_values(&self.live.value(state, actions)?, actions)?;
                let next_values = select_values(
                    &bootstrap.value(batch.next_state(), &next.restored_actions)?,
                    &next.restored_actions,
                )?;
                (log_prob, values, baselines, next_values)
            }
        };
        trace!("Computed values and baselines");

        let returns = compute_returns(
            batch.rewards(),
            &next_values.detach(),
            batch.done(),
            batch.last_step(),
            self.gamma,
        )?;
        let value_loss = value_loss(&returns, &values)?;
        let advantages = advantages(&values, &baselines, self.normalize_advantages)?;
        let policy_loss = policy_loss(&advantages, &log_prob, avail)?;
        trace!("Computed losses");

        Ok(Losses {
            policy_loss,
            value_loss,
            action_out,
        })
    }

    /// Selects actions for observations `(batch, n_agents, obs_dim)`.
    ///
    /// With `target = true` the target policy is used, if one is configured.
    pub fn get_actions(
        &mut self,
        obs: &Tensor,
        status: Status,
        exploration: bool,
        avail: &Tensor,
        target: bool,
    ) -> Result<SelectedAction> {
        let model = match (&self.target, target) {
            (Some(t), true) => t.model(),
            _ => &self.live,
        };
        self.selector.act(model, obs, status, exploration, avail)
    }

    /// Policy output of the live model.
    pub fn policy(&self, obs: &Tensor) -> Result<PolicyOutput> {
        self.live.policy(obs)
    }

    /// Output of the live centralized critic, `(lead, n_agents, out_dim)`.
    pub fn value(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        self.live.value(obs, act)
    }

    /// The live model.
    pub fn model(&self) -> &Model<P, V> {
        &self.live
    }

    /// The target model, if configured.
    pub fn target_model(&self) -> Option<&Model<P, V>> {
        self.target.as_ref().map(|t| t.model())
    }

    /// Copies the live parameters into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        if let Some(target) = self.target.as_mut() {
            target.sync(&self.live)?;
            info!("Synchronized the target network of COMA agent");
        }
        Ok(())
    }

    /// Moves the target parameters towards the live ones by `tau`.
    pub fn soft_update_target(&mut self) -> Result<()> {
        if let Some(target) = self.target.as_mut() {
            target.soft_update(&self.live, self.tau)?;
        }
        Ok(())
    }

    /// Applies one optimizer step to the actor and the critic.
    pub fn backward_step(&mut self, losses: &Losses) -> Result<()> {
        self.live.backward_step(losses)
    }

    /// Resets the generator of the action selector.
    pub fn seed(&mut self, seed: u64) {
        self.selector.seed(seed);
    }

    /// Saves the parameters of the live model, and of the target under `target/`.
    pub fn save_params(&self, path: impl AsRef<Path>) -> Result<()> {
        self.live.save(&path)?;
        if let Some(target) = self.target.as_ref() {
            target.save(path.as_ref().join("target"))?;
        }
        Ok(())
    }

    /// Loads parameters saved with [`Coma::save_params`].
    pub fn load_params(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.live.load(&path)?;
        if let Some(target) = self.target.as_mut() {
            target.load(path.as_ref().join("target"))?;
        }
        Ok(())
    }
}

impl<P, V> Configurable for Coma<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    type Config = ComaConfig<P, V>;

    /// Constructs [`Coma`] agent.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device = config
            .device
            .context("No device is given for COMA agent")?
            .open()?;
        let policy_out = config
            .actor_config
            .policy_config
            .as_ref()
            .context("policy_config is not set.")?
            .get_out_dim();
        if policy_out != config.act_dim {
            return Err(MarlError::InvalidConfig(format!(
                "policy output dimension is {}, expected {}",
                policy_out, config.act_dim
            ))
            .into());
        }

        let estimator = CentralizedValue::new(
            config.n_agents,
            config.obs_dim,
            config.act_dim,
            config.action_space,
        );
        let actor = Actor::build(config.actor_config, device.clone())?;
        let critic = Critic::build(config.critic_config, device.clone())?;
        let live = ActorCritic::new(actor, critic, estimator, config.obs_dim, config.agent_id)?;

        let mut rng = SmallRng::seed_from_u64(config.seed);
        live.initialize(&config.param_init, &mut rng)?;
        let target = match config.target {
            true => Some(TargetNetwork::new(&live)?),
            false => None,
        };
        let selector = ActionSelector::new(rng.gen(), config.epsilon_softmax);
        info!(
            "Build COMA agent: {} agents, {} {} actions, target network: {}",
            config.n_agents, config.act_dim, config.action_space, config.target
        );

        Ok(Self {
            live,
            target,
            selector,
            action_space: config.action_space,
            gamma: config.gamma,
            sample_size: config.sample_size,
            tau: config.tau,
            normalize_advantages: config.normalize_advantages,
            device,
        })
    }
}
