//! Policy outputs and action selection.
mod output;
mod selector;
pub use output::PolicyOutput;
pub use selector::{ActionSelector, SelectedAction};
