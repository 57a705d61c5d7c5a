//! Configuration of the PPO objective.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Ppo`](super::Ppo).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PpoConfig {
    /// Clipping range of the probability ratio, and of value updates when
    /// `clip_value` is set.
    pub clip_epsilon: f64,

    /// If `true`, the value loss is computed against values clipped around
    /// `old_values`.
    pub clip_value: bool,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            clip_epsilon: 0.2,
            clip_value: false,
        }
    }
}

impl PpoConfig {
    /// Sets the clipping range.
    pub fn clip_epsilon(mut self, v: f64) -> Self {
        self.clip_epsilon = v;
        self
    }

    /// Sets clipping of the value loss.
    pub fn clip_value(mut self, v: bool) -> Self {
        self.clip_value = v;
        self
    }

    /// Loads [`PpoConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PpoConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
