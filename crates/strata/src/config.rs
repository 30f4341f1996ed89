//! Runner configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `strata.ron` file (or the path given with `--config`), if it exists
//! 3. Environment variables prefixed with `STRATA_`
//!
//! Example environment variable: `STRATA_ENGINE__FLUID_ENABLED=false`

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use strata_core::EngineConfig;

/// Top-level runner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub runner: RunnerSettings,
}

/// Simulation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Fixed time step in seconds
    pub dt: f32,
    /// Ticks to run when the scenario does not say
    pub ticks: u64,
    /// Downward gravity in tiles/s^2
    pub gravity: f32,
    pub viewports: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            ticks: 120,
            gravity: 9.81,
            viewports: 1,
        }
    }
}

impl RunnerConfig {
    /// Load with layered priority, see module docs
    pub fn load(file: &str) -> Result<Self> {
        let defaults = Config::try_from(&RunnerConfig::default())
            .context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(file).format(FileFormat::Ron).required(false))
            .add_source(Environment::with_prefix("STRATA").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let loaded: RunnerConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        loaded
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.runner.ticks, 120);
        assert_eq!(config.runner.viewports, 1);
        assert_eq!(config.engine.max_rider_depth, 4);
    }

    #[test]
    fn test_load_config_with_defaults() {
        let config = RunnerConfig::load("does-not-exist").expect("Failed to load config");
        assert_eq!(config.runner.ticks, 120);
        assert!(config.engine.check_unstuck);
    }
}
