//! Core traits and enums shared by all agents.
mod configurable;
mod space;
pub use configurable::Configurable;
pub use space::{ActionSpace, Status};
