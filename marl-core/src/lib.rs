#![warn(missing_docs)]
//! Backend-agnostic types for multi-agent actor-critic agents.
//!
//! Tensor computation lives in backend crates such as `marl-candle-agent`;
//! this crate only holds what they share: errors, metric records, the action
//! space and status enums and the [`Configurable`] trait.
pub mod error;
pub mod record;

mod base;
pub use base::{ActionSpace, Configurable, Status};
