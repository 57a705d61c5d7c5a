//! Base implementation of records.
use crate::error::MarlError;
use std::collections::HashMap;

/// Values stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically a loss.
    Scalar(f32),
}

/// A container of key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Gets a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, MarlError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            None => Err(MarlError::RecordKeyError(k.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_scalar() {
        let r = Record::from_slice(&[
            ("loss_policy", RecordValue::Scalar(1.0)),
            ("loss_value", RecordValue::Scalar(2.0)),
        ]);

        assert_eq!(r.get_scalar("loss_policy").unwrap(), 1.0);
        assert_eq!(r.get_scalar("loss_value").unwrap(), 2.0);
        assert!(matches!(
            r.get_scalar("missing"),
            Err(MarlError::RecordKeyError(_))
        ));
    }
}
