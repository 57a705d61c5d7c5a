//! Records of scalar metrics produced by loss computation.
//!
//! A [`Record`] is a flat map from names to [`RecordValue`]s. Agents return
//! one from each loss call so that an external logger can consume the values
//! without touching tensors.
//!
//! ```rust
//! use marl_core::record::{Record, RecordValue};
//!
//! let record = Record::from_slice(&[("loss_value", RecordValue::Scalar(0.25))]);
//! assert_eq!(record.get_scalar("loss_value").unwrap(), 0.25);
//! assert!(record.get_scalar("loss_policy").is_err());
//! ```
mod base;

pub use base::{Record, RecordValue};
