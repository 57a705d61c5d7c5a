//! Critic holding a value network with its parameters and optimizer.
use super::track;
use crate::{
    model::{ModelConfig, RecurrentSubModel},
    opt::{Optimizer, OptimizerConfig},
};
use anyhow::{anyhow, Context, Result};
use candle_core::{DType::F32, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Critic`].
pub struct CriticConfig<V> {
    /// Configuration of the value network.
    pub value_config: Option<V>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<V> Default for CriticConfig<V> {
    fn default() -> Self {
        Self {
            value_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<V: ModelConfig> CriticConfig<V> {
    /// Sets configurations for the value network.
    pub fn value_config(mut self, v: V) -> Self {
        self.value_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`CriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CriticConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Critic shared by all agents.
///
/// What the value network sees per agent is decided by a
/// [`ValueEstimator`](crate::value::ValueEstimator); the critic only runs it.
pub struct Critic<V>
where
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    device: Device,
    varmap: VarMap,

    value_config: V::Config,
    value: V,

    opt_config: OptimizerConfig,
    opt: Option<Optimizer>, // none for frozen copies
}

impl<V> Critic<V>
where
    V: RecurrentSubModel,
    V::Config: ModelConfig,
{
    /// Constructs [`Critic`].
    pub fn build(config: CriticConfig<V::Config>, device: Device) -> Result<Self> {
        let value_config = config.value_config.context("value_config is not set.")?;
        Self::_build(value_config, config.opt_config, device, true)
    }

    fn _build(
        value_config: V::Config,
        opt_config: OptimizerConfig,
        device: Device,
        with_opt: bool,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let value = {
            let vb = VarBuilder::from_varmap(&varmap, F32, &device).set_prefix("critic");
            V::build(vb, value_config.clone())?
        };
        let opt = match with_opt {
            true => Some(opt_config.build(varmap.all_vars())?),
            false => None,
        };

        Ok(Self {
            device,
            varmap,
            value_config,
            value,
            opt_config,
            opt,
        })
    }

    /// Returns a copy with its own parameters and no optimizer.
    pub fn frozen_copy(&self) -> Result<Self> {
        let copy = Self::_build(
            self.value_config.clone(),
            self.opt_config.clone(),
            self.device.clone(),
            false,
        )?;
        track(&copy.varmap, &self.varmap, 1.0)?;
        Ok(copy)
    }

    /// Runs the value network on assembled inputs `(rows, in_dim)`.
    pub fn forward(&self, xs: &Tensor, hidden: Option<&Tensor>) -> Result<(Tensor, Option<Tensor>)> {
        self.value.forward(xs, hidden)
    }

    /// Configuration of the value network.
    pub fn value_config(&self) -> &V::Config {
        &self.value_config
    }

    /// Parameters of the value network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Updates the parameters of the value network.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt
            .as_mut()
            .ok_or_else(|| anyhow!("Frozen critic has no optimizer"))?
            .backward_step(loss)
    }

    /// Save variables to prefix + ".pt".
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("pt");
        self.varmap.save(path.as_path())?;
        info!("Save critic parameters to {:?}", path);

        Ok(path)
    }

    /// Load variables from prefix + ".pt".
    pub fn load(&mut self, prefix: impl AsRef<Path>) -> Result<()> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("pt");
        self.varmap.load(path.as_path())?;
        info!("Load critic parameters from {:?}", path);

        Ok(())
    }
}
