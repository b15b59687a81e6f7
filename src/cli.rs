//! Command line surface of the three drivers.
//!
//! Arguments are applied on top of the layered configuration, so anything
//! given here wins over files and `HARNESS__*` variables.

use clap::Args;
use clap::Parser;

use crate::HarnessConfig;
use crate::Result;

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArg {
    /// Extra configuration file merged over defaults and `HARNESS_CONFIG_PATH`
    #[arg(long, value_name = "FILE")]
    pub config: Option<String>,
}

impl ConfigArg {
    /// Layered configuration plus the `--config` file, not yet validated.
    pub fn load(&self) -> Result<HarnessConfig> {
        let base = HarnessConfig::new()?;
        match &self.config {
            Some(path) => base.with_override_config(path),
            None => Ok(base),
        }
    }
}

/// Populate, then run the random read/update workload.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct RandomWorkloadArgs {
    /// Number of keys loaded before the workload starts
    pub entry_count: u64,

    /// Value buffer size; stored values are one byte shorter
    pub value_size: usize,

    /// Workload threads
    pub thread_count: usize,

    /// Probability of a read, in [0, 1]
    pub read_ratio: f64,

    /// Operations per workload thread
    pub op_count: u64,

    #[command(flatten)]
    pub config: ConfigArg,
}

impl RandomWorkloadArgs {
    pub fn apply(
        &self,
        mut config: HarnessConfig,
    ) -> HarnessConfig {
        config.workload.entry_count = self.entry_count;
        config.workload.value_size = self.value_size;
        config.workload.thread_count = self.thread_count;
        config.workload.read_ratio = self.read_ratio;
        config.workload.op_count = self.op_count;
        config
    }

    pub fn load_config(&self) -> Result<HarnessConfig> {
        self.apply(self.config.load()?).validate()
    }
}

/// Concurrent reader/writer consistency stress test.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ReadWriteArgs {
    #[arg(long)]
    pub entry_count: Option<u64>,

    #[arg(long)]
    pub value_size: Option<usize>,

    /// Stop after this many cycles per thread instead of running until killed
    #[arg(long)]
    pub iterations: Option<u64>,

    #[command(flatten)]
    pub config: ConfigArg,
}

impl ReadWriteArgs {
    pub fn apply(
        &self,
        mut config: HarnessConfig,
    ) -> HarnessConfig {
        if let Some(n) = self.entry_count {
            config.workload.entry_count = n;
        }
        if let Some(n) = self.value_size {
            config.workload.value_size = n;
        }
        config
    }

    pub fn load_config(&self) -> Result<HarnessConfig> {
        self.apply(self.config.load()?).validate()
    }
}

/// Write a fixed dataset, then read every key back.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ReadCheckArgs {
    #[arg(long, default_value_t = 2_000_000)]
    pub entry_count: u64,

    #[command(flatten)]
    pub config: ConfigArg,
}

impl ReadCheckArgs {
    pub fn apply(
        &self,
        mut config: HarnessConfig,
    ) -> HarnessConfig {
        config.workload.entry_count = self.entry_count;
        config
    }

    pub fn load_config(&self) -> Result<HarnessConfig> {
        self.apply(self.config.load()?).validate()
    }
}
