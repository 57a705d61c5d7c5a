use anyhow::Result;
use candle_core::Tensor;
use marl_core::{error::MarlError, ActionSpace};

fn space_mismatch(expected: ActionSpace, actual: ActionSpace) -> anyhow::Error {
    MarlError::ActionSpaceMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
    .into()
}

/// Output of a policy network.
///
/// Tensors are `(rows, act_dim)` as returned by a network and
/// `(batch, n_agents, act_dim)` once unfolded per agent. Continuous policies
/// may emit an extra component axis, `(batch, n_agents, components, act_dim)`,
/// which is summed out by [`PolicyOutput::gaussian_params`].
#[derive(Debug, Clone)]
pub enum PolicyOutput {
    /// Unnormalized log-probabilities of discrete actions.
    Discrete {
        /// Logits.
        logits: Tensor,
    },

    /// Parameters of a diagonal Gaussian.
    Continuous {
        /// Means.
        means: Tensor,
        /// Log standard deviations.
        log_stds: Tensor,
    },
}

impl PolicyOutput {
    /// Returns the action space of this output.
    pub fn action_space(&self) -> ActionSpace {
        match self {
            Self::Discrete { .. } => ActionSpace::Discrete,
            Self::Continuous { .. } => ActionSpace::Continuous,
        }
    }

    /// Fails with [`MarlError::ActionSpaceMismatch`] unless this output
    /// belongs to `expected`.
    pub fn expect_space(&self, expected: ActionSpace) -> Result<()> {
        match self.action_space() {
            actual if actual != expected => Err(space_mismatch(expected, actual)),
            _ => Ok(()),
        }
    }

    /// Returns the logits of a discrete policy.
    pub fn logits(&self) -> Result<&Tensor> {
        match self {
            Self::Discrete { logits } => Ok(logits),
            Self::Continuous { .. } => Err(space_mismatch(
                ActionSpace::Discrete,
                ActionSpace::Continuous,
            )),
        }
    }

    /// Returns means and log standard deviations of a continuous policy.
    ///
    /// A component axis (rank 4) is summed out, giving `(batch, n_agents, act_dim)`.
    pub fn gaussian_params(&self) -> Result<(Tensor, Tensor)> {
        match self {
            Self::Continuous { means, log_stds } => match means.rank() {
                4 => Ok((means.sum(2)?, log_stds.sum(2)?)),
                _ => Ok((means.clone(), log_stds.clone())),
            },
            Self::Discrete { .. } => Err(space_mismatch(
                ActionSpace::Continuous,
                ActionSpace::Discrete,
            )),
        }
    }

    /// Splits the leading `batch * n_agents` rows into `(batch, n_agents)`.
    pub fn unfold(self, batch_size: usize, n_agents: usize) -> Result<Self> {
        let unfold = |t: Tensor| -> Result<Tensor> {
            let mut dims = vec![batch_size, n_agents];
            dims.extend_from_slice(&t.dims()[1..]);
            Ok(t.reshape(dims)?)
        };

        match self {
            Self::Discrete { logits } => Ok(Self::Discrete {
                logits: unfold(logits)?,
            }),
            Self::Continuous { means, log_stds } => Ok(Self::Continuous {
                means: unfold(means)?,
                log_stds: unfold(log_stds)?,
            }),
        }
    }

    /// Returns a copy detached from the computation graph.
    pub fn detach(&self) -> Self {
        match self {
            Self::Discrete { logits } => Self::Discrete {
                logits: logits.detach(),
            },
            Self::Continuous { means, log_stds } => Self::Continuous {
                means: means.detach(),
                log_stds: log_stds.detach(),
            },
        }
    }
}
