//! Configuration of COMA agent.
use crate::{
    action::PolicyOutput,
    model::{ModelConfig, RecurrentSubModel, SubModel1},
    util::{ActorConfig, CriticConfig, ParamInit},
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use log::info;
use marl_core::{error::MarlError, ActionSpace};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Coma`](super::Coma).
#[derive(Deserialize, Serialize)]
pub struct ComaConfig<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    /// Configuration of the actor.
    pub actor_config: ActorConfig<P::Config>,

    /// Configuration of the centralized critic.
    pub critic_config: CriticConfig<V::Config>,

    /// Number of agents.
    pub n_agents: usize,

    /// Dimension of the observation of each agent.
    pub obs_dim: usize,

    /// Number of actions (discrete) or dimension of the action vector
    /// (continuous) of each agent.
    pub act_dim: usize,

    /// Type of the action space.
    pub action_space: ActionSpace,

    /// Discount factor.
    pub gamma: f64,

    /// Number of Monte-Carlo samples of the continuous baseline.
    pub sample_size: usize,

    /// If `true`, next actions and next values are computed with a target network.
    pub target: bool,

    /// Soft update coefficient of the target network.
    pub tau: f64,

    /// If `true`, advantages are normalized per agent over the batch.
    pub normalize_advantages: bool,

    /// If `true`, one-hot agent identifiers are appended to policy inputs.
    pub agent_id: bool,

    /// Mixing weight of uniform exploration over available discrete actions.
    pub epsilon_softmax: Option<f64>,

    /// Initialization of network parameters.
    pub param_init: ParamInit,

    /// Seed of parameter initialization and action sampling.
    pub seed: u64,

    /// Device used for the actor and critic models (e.g., CPU or GPU).
    pub device: Option<Device>,
}

impl<P, V> Clone for ComaConfig<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    fn clone(&self) -> Self {
        Self {
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            n_agents: self.n_agents,
            obs_dim: self.obs_dim,
            act_dim: self.act_dim,
            action_space: self.action_space,
            gamma: self.gamma,
            sample_size: self.sample_size,
            target: self.target,
            tau: self.tau,
            normalize_advantages: self.normalize_advantages,
            agent_id: self.agent_id,
            epsilon_softmax: self.epsilon_softmax,
            param_init: self.param_init,
            seed: self.seed,
            device: self.device,
        }
    }
}

impl<P, V> Default for ComaConfig<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            n_agents: 1,
            obs_dim: 1,
            act_dim: 1,
            action_space: ActionSpace::Discrete,
            gamma: 0.99,
            sample_size: 10,
            target: true,
            tau: 0.01,
            normalize_advantages: false,
            agent_id: true,
            epsilon_softmax: None,
            param_init: ParamInit::default(),
            seed: 42,
            device: None,
        }
    }
}

impl<P, V> ComaConfig<P, V>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    /// Sets the number of agents and per-agent observation and action dimensions.
    pub fn dims(mut self, n_agents: usize, obs_dim: usize, act_dim: usize) -> Self {
        self.n_agents = n_agents;
        self.obs_dim = obs_dim;
        self.act_dim = act_dim;
        self
    }

    /// Type of the action space.
    pub fn action_space(mut self, v: ActionSpace) -> Self {
        self.action_space = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Number of Monte-Carlo samples of the continuous baseline.
    pub fn sample_size(mut self, v: usize) -> Self {
        self.sample_size = v;
        self
    }

    /// Use of a target network.
    pub fn target(mut self, v: bool) -> Self {
        self.target = v;
        self
    }

    /// Soft update coefficient of the target network.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Normalization of advantages.
    pub fn normalize_advantages(mut self, v: bool) -> Self {
        self.normalize_advantages = v;
        self
    }

    /// Agent identifiers in policy inputs.
    pub fn agent_id(mut self, v: bool) -> Self {
        self.agent_id = v;
        self
    }

    /// Uniform exploration mixed into sampled discrete actions.
    pub fn epsilon_softmax(mut self, v: Option<f64>) -> Self {
        self.epsilon_softmax = v;
        self
    }

    /// Initialization of network parameters.
    pub fn param_init(mut self, v: ParamInit) -> Self {
        self.param_init = v;
        self
    }

    /// Random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Configuration of actor.
    pub fn actor_config(mut self, actor_config: ActorConfig<P::Config>) -> Self {
        self.actor_config = actor_config;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, critic_config: CriticConfig<V::Config>) -> Self {
        self.critic_config = critic_config;
        self
    }

    /// Device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Checks values that do not depend on the networks.
    pub(super) fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MarlError::InvalidConfig(msg).into());
        if self.n_agents == 0 || self.obs_dim == 0 || self.act_dim == 0 {
            return invalid(format!(
                "n_agents, obs_dim and act_dim must be positive, got {}, {}, {}",
                self.n_agents, self.obs_dim, self.act_dim
            ));
        }
        if self.sample_size == 0 {
            return invalid("sample_size must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return invalid(format!("tau must be in [0, 1], got {}", self.tau));
        }
        if let Some(eps) = self.epsilon_softmax {
            if !(0.0..=1.0).contains(&eps) {
                return invalid(format!("epsilon_softmax must be in [0, 1], got {}", eps));
            }
        }
        Ok(())
    }

    /// Saves [`ComaConfig`] to YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of COMA agent into {:?}", path_);
        Ok(())
    }

    /// Constructs [`ComaConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of COMA agent from {:?}", path_);
        Ok(b)
    }
}
