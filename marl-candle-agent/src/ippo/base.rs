//! IPPO agent.
use super::IppoConfig;
use crate::{
    action::{ActionSelector, PolicyOutput, SelectedAction},
    actor_critic::{ActorCritic, ActorCriticModel, TargetNetwork},
    model::{ModelConfig, RecurrentSubModel, SubModel1},
    ppo::Ppo,
    util::{Actor, Critic, OutDim},
    value::DecentralizedValue,
    Losses, MarlBatch,
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use log::{info, trace};
use marl_core::{error::MarlError, ActionSpace, Configurable, Status};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::path::Path;

type Model<P, V> = ActorCritic<P, V, DecentralizedValue>;

/// Independent PPO agent.
pub struct Ippo<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    live: Model<P, V>,
    target: Option<TargetNetwork<P, V, DecentralizedValue>>,
    selector: ActionSelector,
    ppo: Ppo,
    action_space: ActionSpace,
    gamma: f64,
    tau: f64,
    normalize_advantages: bool,
    device: Device,
}

impl<P, V> Ippo<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    /// Computes the PPO losses of the live model on a batch.
    pub fn get_loss(&mut self, batch: &MarlBatch) -> Result<Losses> {
        let batch = batch.to_device(&self.device)?;
        batch.validate()?;
        trace!("IPPO loss on a batch of {} steps", batch.len());

        let losses = self.ppo.get_loss(
            &batch,
            &self.live,
            self.target.as_ref().map(|t| t.model()),
            &mut self.selector,
            self.gamma,
            self.normalize_advantages,
        )?;
        losses.action_out.expect_space(self.action_space)?;
        Ok(losses)
    }

    /// Selects actions for observations `(batch, n_agents, obs_dim)`.
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

    /// State values `(batch, n_agents, 1)`; `act` is not used.
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
            info!("Synchronized the target network of IPPO agent");
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

    /// Loads parameters saved with [`Ippo::save_params`].
    pub fn load_params(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.live.load(&path)?;
        if let Some(target) = self.target.as_mut() {
            target.load(path.as_ref().join("target"))?;
        }
        Ok(())
    }
}

impl<P, V> Configurable for Ippo<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    type Config = IppoConfig<P, V>;

    /// Constructs [`Ippo`] agent.
    fn build(config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device = config
            .device
            .context("No device is given for IPPO agent")?
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

        let ppo = Ppo::build(config.ppo_config)?;
        let estimator = DecentralizedValue::new(config.n_agents, config.obs_dim);
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
            "Build IPPO agent: {} agents, {} {} actions, clip_epsilon: {}",
            config.n_agents,
            config.act_dim,
            config.action_space,
            ppo.clip_epsilon()
        );

        Ok(Self {
            live,
            target,
            selector,
            ppo,
            action_space: config.action_space,
            gamma: config.gamma,
            tau: config.tau,
            normalize_advantages: config.normalize_advantages,
            device,
        })
    }
}
