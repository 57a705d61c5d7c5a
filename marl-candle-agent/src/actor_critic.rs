//! Actor-critic model shared by all agents, and its target copy.
use crate::{
    action::PolicyOutput,
    model::{ModelConfig, RecurrentSubModel, SubModel1},
    util::{agent_ids, initialize, track, Actor, Critic, InDim, OutDim, ParamInit},
    value::ValueEstimator,
    Losses,
};
use anyhow::Result;
use candle_core::{Tensor, D};
use log::info;
use marl_core::error::MarlError;
use rand::Rng;
use std::path::{Path, PathBuf};

/// A policy and a value function over all agents of a batch.
///
/// Losses are computed against this trait, so that the live model and its
/// target copy are interchangeable.
pub trait ActorCriticModel {
    /// Number of agents.
    fn n_agents(&self) -> usize;

    /// Policy output per agent given observations `(batch, n_agents, obs_dim)`.
    fn policy(&self, obs: &Tensor) -> Result<PolicyOutput>;

    /// Value per agent, `(lead, n_agents, out_dim)`.
    fn value(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor>;
}

/// An [`Actor`] and a [`Critic`] used by every agent, with parameters
/// shared across agents.
pub struct ActorCritic<P, V, E>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
    E: ValueEstimator,
{
    actor: Actor<P>,
    critic: Critic<V>,
    estimator: E,
    agent_id: bool,
}

impl<P, V, E> ActorCritic<P, V, E>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
    E: ValueEstimator + Clone,
{
    /// Bundles an actor and a critic, checking their dimensions.
    ///
    /// * `agent_id` - If `true`, one-hot agent identifiers are appended to
    ///   the observations fed to the policy.
    pub fn new(
        actor: Actor<P>,
        critic: Critic<V>,
        estimator: E,
        obs_dim: usize,
        agent_id: bool,
    ) -> Result<Self> {
        let policy_in = obs_dim + if agent_id { estimator.n_agents() } else { 0 };
        check_dim("policy input", actor.policy_config().get_in_dim(), policy_in)?;
        check_dim("value input", critic.value_config().get_in_dim(), estimator.in_dim())?;
        check_dim("value output", critic.value_config().get_out_dim(), estimator.out_dim())?;

        Ok(Self {
            actor,
            critic,
            estimator,
            agent_id,
        })
    }

    /// Re-draws all parameters from `rng`, actor first.
    pub fn initialize(&self, init: &ParamInit, rng: &mut impl Rng) -> Result<()> {
        initialize(self.actor.varmap(), init, rng)?;
        initialize(self.critic.varmap(), init, rng)
    }

    /// Returns a copy with its own parameters and no optimizers.
    pub fn frozen_copy(&self) -> Result<Self> {
        Ok(Self {
            actor: self.actor.frozen_copy()?,
            critic: self.critic.frozen_copy()?,
            estimator: self.estimator.clone(),
            agent_id: self.agent_id,
        })
    }

    /// The actor.
    pub fn actor(&self) -> &Actor<P> {
        &self.actor
    }

    /// The critic.
    pub fn critic(&self) -> &Critic<V> {
        &self.critic
    }

    /// The value estimator.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Applies one optimizer step to the critic on the value loss and one to
    /// the actor on the policy loss.
    pub fn backward_step(&mut self, losses: &Losses) -> Result<()> {
        self.critic.backward_step(&losses.value_loss)?;
        self.actor.backward_step(&losses.policy_loss)
    }

    /// Saves parameters into `actor.pt` and `critic.pt` under `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&path)?;
        let paths = vec![
            self.actor.save(path.as_ref().join("actor"))?,
            self.critic.save(path.as_ref().join("critic"))?,
        ];
        info!("Save actor-critic model to {:?}", path.as_ref());
        Ok(paths)
    }

    /// Loads parameters saved with [`ActorCritic::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.actor.load(path.as_ref().join("actor"))?;
        self.critic.load(path.as_ref().join("critic"))?;
        info!("Load actor-critic model from {:?}", path.as_ref());
        Ok(())
    }
}

impl<P, V, E> ActorCriticModel for ActorCritic<P, V, E>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
    E: ValueEstimator,
{
    fn n_agents(&self) -> usize {
        self.estimator.n_agents()
    }

    fn policy(&self, obs: &Tensor) -> Result<PolicyOutput> {
        let (b, n, _) = obs.dims3()?;
        if n != self.n_agents() {
            return Err(MarlError::shape(
                "observations",
                &[b, self.n_agents(), obs.dim(2)?],
                obs.dims(),
            )
            .into());
        }
        let inputs = match self.agent_id {
            true => Tensor::cat(&[obs, &agent_ids(b, n, obs.device())?], D::Minus1)?,
            false => obs.clone(),
        };
        let in_dim = inputs.dim(2)?;
        self.actor
            .forward(&inputs.reshape((b * n, in_dim))?)?
            .unfold(b, n)
    }

    fn value(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        self.estimator.value(&self.critic, obs, act)
    }
}

fn check_dim(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(MarlError::InvalidConfig(format!(
            "{} dimension is {}, expected {}",
            what, actual, expected
        ))
        .into());
    }
    Ok(())
}

/// Frozen copy of an [`ActorCritic`] used for bootstrapping.
///
/// Its parameters change only through [`TargetNetwork::sync`] and
/// [`TargetNetwork::soft_update`].
pub struct TargetNetwork<P, V, E>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
    E: ValueEstimator,
{
    model: ActorCritic<P, V, E>,
}

impl<P, V, E> TargetNetwork<P, V, E>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
    V: RecurrentSubModel,
    V::Config: ModelConfig,
    E: ValueEstimator + Clone,
{
    /// Creates a copy of `live`.
    pub fn new(live: &ActorCritic<P, V, E>) -> Result<Self> {
        Ok(Self {
            model: live.frozen_copy()?,
        })
    }

    /// Copies all parameters of `live`.
    pub fn sync(&mut self, live: &ActorCritic<P, V, E>) -> Result<()> {
        self.soft_update(live, 1.0)
    }

    /// `target = tau * live + (1 - tau) * target`, for every parameter.
    pub fn soft_update(&mut self, live: &ActorCritic<P, V, E>, tau: f64) -> Result<()> {
        track(self.model.actor.varmap(), live.actor.varmap(), tau)?;
        track(self.model.critic.varmap(), live.critic.varmap(), tau)
    }

    /// The frozen model.
    pub fn model(&self) -> &ActorCritic<P, V, E> {
        &self.model
    }

    /// Saves the frozen parameters like [`ActorCritic::save`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        self.model.save(path)
    }

    /// Overwrites the frozen parameters with ones saved by [`TargetNetwork::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.model.load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::{Mlp, MlpConfig, PolicyMlp, PolicyMlpConfig},
        util::{ActorConfig, CriticConfig},
        value::DecentralizedValue,
    };
    use candle_core::{DType, Device};
    use marl_core::ActionSpace;
    use rand::{rngs::SmallRng, SeedableRng};

    type Model = ActorCritic<PolicyMlp, Mlp, DecentralizedValue>;

    fn model(policy_in: usize) -> Result<Model> {
        let actor = Actor::build(
            ActorConfig::default()
                .policy_config(PolicyMlpConfig::new(policy_in, vec![8], 3, ActionSpace::Discrete)),
            Device::Cpu,
        )?;
        let critic = Critic::build(
            CriticConfig::default().value_config(MlpConfig::new(4, vec![8], 1, false)),
            Device::Cpu,
        )?;
        Model::new(actor, critic, DecentralizedValue::new(2, 2), 2, true)
    }

    fn values(model: &Model) -> Result<Vec<f32>> {
        let obs = Tensor::ones((1, 2, 2), DType::F32, &Device::Cpu)?;
        Ok(model.value(&obs, &obs)?.flatten_all()?.to_vec1::<f32>()?)
    }

    #[test]
    fn test_dimension_check() {
        let err = model(2).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<MarlError>(),
            Some(MarlError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_policy_unfolds_agents() -> Result<()> {
        let model = model(4)?;
        let obs = Tensor::ones((5, 2, 2), DType::F32, &Device::Cpu)?;
        assert_eq!(model.policy(&obs)?.logits()?.dims(), &[5, 2, 3]);
        assert_eq!(model.value(&obs, &obs)?.dims(), &[5, 2, 1]);
        let obs = Tensor::ones((5, 3, 2), DType::F32, &Device::Cpu)?;
        assert!(model.policy(&obs).is_err());
        Ok(())
    }

    #[test]
    fn test_target_network() -> Result<()> {
        let live = model(4)?;
        live.initialize(&ParamInit::Uniform, &mut SmallRng::seed_from_u64(0))?;
        let mut target = TargetNetwork::new(&live)?;
        assert_eq!(values(&live)?, values(target.model())?);

        live.initialize(&ParamInit::Uniform, &mut SmallRng::seed_from_u64(1))?;
        let before = values(target.model())?;
        assert_ne!(values(&live)?, before);

        target.soft_update(&live, 0.0)?;
        assert_eq!(values(target.model())?, before);
        target.sync(&live)?;
        assert_eq!(values(&live)?, values(target.model())?);
        Ok(())
    }
}
