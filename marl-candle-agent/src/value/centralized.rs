use super::ValueEstimator;
use crate::util::{agent_ids, check_dims};
use anyhow::Result;
use candle_core::{Tensor, D};
use marl_core::{error::MarlError, ActionSpace};

/// Centralized critic input of COMA.
///
/// For agent `i` the value network sees, in this order:
///
/// 1. the observations of all agents, flattened,
/// 2. the observation of agent `i`,
/// 3. the one-hot identifier of agent `i`,
/// 4. the actions of all agents, flattened. For discrete actions the slot of
///    agent `i` is zeroed and the network outputs one value per action of
///    agent `i` (a Q-function). For continuous actions all actions are kept and
///    the network outputs a single value.
///
/// Continuous actions may also be given as `(samples * batch, n_agents,
/// n_agents * act_dim)`, one joint action per agent and sample, which is how
/// the Monte-Carlo baseline evaluates counterfactual actions. Observations are
/// then repeated over samples and outputs come out as `(samples * batch,
/// n_agents, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralizedValue {
    n_agents: usize,
    obs_dim: usize,
    act_dim: usize,
    action_space: ActionSpace,
}

impl CentralizedValue {
    /// Creates the estimator.
    pub fn new(n_agents: usize, obs_dim: usize, act_dim: usize, action_space: ActionSpace) -> Self {
        Self {
            n_agents,
            obs_dim,
            act_dim,
            action_space,
        }
    }

    /// Mask zeroing the action slot of the agent itself, `(n_agents, n_agents * act_dim)`.
    fn others_mask(&self, act: &Tensor) -> Result<Tensor> {
        let (n, a) = (self.n_agents, self.act_dim);
        let mask = (0..n * n * a)
            .map(|k| match k / (n * a) == (k % (n * a)) / a {
                true => 0f32,
                false => 1f32,
            })
            .collect::<Vec<_>>();
        Ok(Tensor::from_vec(mask, (n, n * a), act.device())?)
    }
}

impl ValueEstimator for CentralizedValue {
    fn n_agents(&self) -> usize {
        self.n_agents
    }

    fn in_dim(&self) -> usize {
        let (n, o, a) = (self.n_agents, self.obs_dim, self.act_dim);
        (n + 1) * o + n + n * a
    }

    fn out_dim(&self) -> usize {
        match self.action_space {
            ActionSpace::Discrete => self.act_dim,
            ActionSpace::Continuous => 1,
        }
    }

    fn assemble(&self, obs: &Tensor, act: &Tensor) -> Result<(Tensor, usize)> {
        let (n, o, a) = (self.n_agents, self.obs_dim, self.act_dim);
        let b = obs.dim(0)?;
        check_dims("observations", obs, &[b, n, o])?;
        let (lead, _, k) = act.dims3()?;
        let sampled = lead != b || (k == n * a && n > 1);

        let act = match (sampled, self.action_space) {
            (false, ActionSpace::Discrete) => {
                check_dims("actions", act, &[b, n, a])?;
                act.reshape((b, 1, n * a))?
                    .broadcast_as((b, n, n * a))?
                    .broadcast_mul(&self.others_mask(act)?)?
                    .reshape((b * n, n * a))?
            }
            (false, ActionSpace::Continuous) => {
                check_dims("actions", act, &[b, n, a])?;
                act.reshape((b, 1, n * a))?
                    .broadcast_as((b, n, n * a))?
                    .reshape((b * n, n * a))?
            }
            (true, ActionSpace::Continuous) if lead % b == 0 => {
                check_dims("sampled actions", act, &[lead, n, n * a])?;
                act.reshape((lead * n, n * a))?
            }
            (true, _) => {
                return Err(MarlError::shape("actions", &[b, n, a], act.dims()).into());
            }
        };

        let s = lead / b;
        let joint = obs
            .reshape((b, 1, n * o))?
            .broadcast_as((s, b, n, n * o))?
            .reshape((lead * n, n * o))?;
        let own = obs.broadcast_as((s, b, n, o))?.reshape((lead * n, o))?;
        let ids = agent_ids(lead, n, obs.device())?.reshape((lead * n, n))?;

        Ok((Tensor::cat(&[joint, own, ids, act], D::Minus1)?, lead))
    }
}
