//! Action spaces and running status.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of the per-agent action space.
///
/// Discrete and continuous code paths are mutually exclusive; this enum is
/// matched exhaustively wherever they diverge.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum ActionSpace {
    /// Categorical actions, represented as one-hot vectors.
    Discrete,

    /// Real-valued action vectors drawn from a diagonal Gaussian.
    Continuous,
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete => write!(f, "discrete"),
            Self::Continuous => write!(f, "continuous"),
        }
    }
}

/// Whether actions are taken for training or for evaluation.
///
/// Evaluation always acts greedily, regardless of the exploration flag.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum Status {
    /// Training.
    Train,

    /// Evaluation.
    Eval,
}
