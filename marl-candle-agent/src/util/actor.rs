//! Actor holding a policy network with its parameters and optimizer.
use super::track;
use crate::{
    action::PolicyOutput,
    model::{ModelConfig, SubModel1},
    opt::{Optimizer, OptimizerConfig},
};
use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Actor`].
pub struct ActorConfig<P> {
    /// Configuration of the policy network.
    pub policy_config: Option<P>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<P> Default for ActorConfig<P> {
    fn default() -> Self {
        Self {
            policy_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<P: ModelConfig> ActorConfig<P> {
    /// Sets configurations for policy function.
    pub fn policy_config(mut self, v: P) -> Self {
        self.policy_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Loads [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Actor shared by all agents.
///
/// The policy network maps per-agent inputs `(rows, in_dim)` to a
/// [`PolicyOutput`].
pub struct Actor<P>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
{
    device: Device,
    varmap: VarMap,

    // Policy network
    policy_config: P::Config,
    policy: P,

    // Optimizer, not present in frozen copies
    opt_config: OptimizerConfig,
    opt: Option<Optimizer>,
}

impl<P> Actor<P>
where
    P: SubModel1<Input = Tensor, Output = PolicyOutput>,
    P::Config: ModelConfig,
{
    /// Constructs [`Actor`].
    pub fn build(config: ActorConfig<P::Config>, device: Device) -> Result<Self> {
        let policy_config = config.policy_config.context("policy_config is not set.")?;
        Self::_build(policy_config, config.opt_config, device, true)
    }

    fn _build(
        policy_config: P::Config,
        opt_config: OptimizerConfig,
        device: Device,
        with_opt: bool,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let policy = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device).set_prefix("actor");
            P::build(vb, policy_config.clone())?
        };
        let opt = match with_opt {
            true => Some(opt_config.build(varmap.all_vars())?),
            false => None,
        };

        Ok(Self {
            device,
            varmap,
            policy_config,
            policy,
            opt_config,
            opt,
        })
    }

    /// Returns a copy with its own parameters and no optimizer.
    ///
    /// The copy never shares storage with `self`; later updates of either
    /// side do not affect the other.
    pub fn frozen_copy(&self) -> Result<Self> {
        let copy = Self::_build(
            self.policy_config.clone(),
            self.opt_config.clone(),
            self.device.clone(),
            false,
        )?;
        track(&copy.varmap, &self.varmap, 1.0)?;
        Ok(copy)
    }

    /// Returns the output of the policy network.
    pub fn forward(&self, x: &Tensor) -> Result<PolicyOutput> {
        self.policy.forward(x)
    }

    /// Configuration of the policy network.
    pub fn policy_config(&self) -> &P::Config {
        &self.policy_config
    }

    /// Parameters of the policy network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Updates the parameters of the policy network.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt
            .as_mut()
            .ok_or_else(|| anyhow!("Frozen actor has no optimizer"))?
            .backward_step(loss)
    }

    /// Save variables to prefix + ".pt".
    pub fn save(&self, prefix: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("pt");
        self.varmap.save(path.as_path())?;
        info!("Save actor parameters to {:?}", path);

        Ok(path)
    }

    /// Load variables from prefix + ".pt".
    pub fn load(&mut self, prefix: impl AsRef<Path>) -> Result<()> {
        let mut path = PathBuf::from(prefix.as_ref());
        path.set_extension("pt");
        self.varmap.load(path.as_path())?;
        info!("Load actor parameters from {:?}", path);

        Ok(())
    }
}
