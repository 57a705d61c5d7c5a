//! Interface of neural networks used in multi-agent actor-critic agents.
use crate::util::{InDim, OutDim};
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Bounds shared by configurations of networks used in agents.
pub trait ModelConfig:
    DeserializeOwned + Serialize + InDim + OutDim + Debug + PartialEq + Clone
{
}

impl<T> ModelConfig for T where
    T: DeserializeOwned + Serialize + InDim + OutDim + Debug + PartialEq + Clone
{
}

/// Neural network model not owing its [`VarMap`] internally.
///
/// Policy networks implement this trait with
/// [`PolicyOutput`](crate::action::PolicyOutput) as their output.
///
/// [`VarMap`]: https://docs.rs/candle-nn/0.8.4/candle_nn/var_map/struct.VarMap.html
pub trait SubModel1 {
    /// Configuration from which [`SubModel1`] is constructed.
    type Config;

    /// Input of the [`SubModel1`].
    type Input;

    /// Output of the [`SubModel1`].
    type Output;

    /// Builds [`SubModel1`] with [`VarBuilder`] and [`SubModel1::Config`].
    ///
    /// [`VarBuilder`]: https://docs.rs/candle-nn/0.8.4/candle_nn/var_builder/type.VarBuilder.html
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;
}

/// Neural network model with an optional hidden state.
///
/// Value networks implement this trait. Feed-forward networks return the
/// given hidden state unchanged; loss computation always passes `None`.
pub trait RecurrentSubModel {
    /// Configuration from which [`RecurrentSubModel`] is constructed.
    type Config;

    /// Builds [`RecurrentSubModel`] with [`VarBuilder`] and its configuration.
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Returns the output and the next hidden state.
    fn forward(&self, xs: &Tensor, hidden: Option<&Tensor>) -> Result<(Tensor, Option<Tensor>)>;
}
