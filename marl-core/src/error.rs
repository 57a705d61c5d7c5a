//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum MarlError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Two tensors that must agree in shape do not.
    ///
    /// `what` names the quantities being compared, e.g. `"returns vs values"`.
    #[error("Shape mismatch ({what}): expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The compared quantities.
        what: String,
        /// The shape required by the contract.
        expected: Vec<usize>,
        /// The shape actually given.
        actual: Vec<usize>,
    },

    /// A discrete code path received continuous policy output or vice versa.
    #[error("Action space mismatch: expected {expected}, got {actual}")]
    ActionSpaceMismatch {
        /// The configured action space.
        expected: String,
        /// The action space of the given data.
        actual: String,
    },

    /// Inconsistent configuration detected when building an agent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MarlError {
    /// Shorthand for [`MarlError::ShapeMismatch`].
    pub fn shape(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_message() {
        let e = MarlError::shape("returns vs values", &[4, 3], &[4, 2]);
        assert_eq!(
            e.to_string(),
            "Shape mismatch (returns vs values): expected [4, 3], got [4, 2]"
        );
    }
}
