//! Configuration management for the harness binaries.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
//!
//! Positional command line arguments are applied last, by the binaries.
mod log;
mod monitoring;
mod store;
mod workload;
pub use log::*;
pub use monitoring::*;
pub use store::*;
pub use workload::*;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable naming a configuration file to merge over defaults.
pub const CONFIG_PATH_ENV: &str = "HARNESS_CONFIG_PATH";

/// Prefix for `HARNESS__SECTION__FIELD` overrides.
const ENV_PREFIX: &str = "HARNESS";

/// Main configuration container for all harness drivers
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `HARNESS_CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct HarnessConfig {
    /// Store backend, home directory and the opaque engine option strings
    #[serde(default)]
    pub store: StoreConfig,
    /// Population and workload shape
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Progress and throughput sampling
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Log sinks
    #[serde(default)]
    pub log: LogConfig,
}

impl Debug for HarnessConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("store", &self.store)
            .field("workload", &self.workload)
            .finish()
    }
}

impl HarnessConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `HARNESS_CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `HARNESS__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so command line arguments can still be applied.
    /// Callers MUST call `validate()` before using the configuration.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` naming the first violated rule.
    pub fn validate(self) -> Result<Self> {
        self.store.validate()?;
        self.workload.validate()?;
        self.monitor.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
