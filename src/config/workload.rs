use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Shape of the dataset and of the operation mix.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkloadConfig {
    /// Keyspace size; keys are `[0, entry_count)`
    #[serde(default = "default_entry_count")]
    pub entry_count: u64,

    /// Buffer size of a value; the stored payload is `value_size - 1` bytes
    #[serde(default = "default_value_size")]
    pub value_size: usize,

    /// Workload worker threads
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Probability that an operation is a read
    #[serde(default = "default_read_ratio")]
    pub read_ratio: f64,

    /// Operations per workload worker
    #[serde(default = "default_op_count")]
    pub op_count: u64,

    /// Bulk loader threads
    #[serde(default = "default_populate_threads")]
    pub populate_threads: usize,

    /// Zero-padded width of encoded keys
    #[serde(default = "default_key_width")]
    pub key_width: usize,

    /// Added to every per-worker seed
    #[serde(default)]
    pub seed_base: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            entry_count: default_entry_count(),
            value_size: default_value_size(),
            thread_count: default_thread_count(),
            read_ratio: default_read_ratio(),
            op_count: default_op_count(),
            populate_threads: default_populate_threads(),
            key_width: default_key_width(),
            seed_base: 0,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.entry_count == 0 {
            return Err(Error::InvalidConfig("entry_count must be at least 1".into()));
        }
        if self.value_size == 0 {
            return Err(Error::InvalidConfig("value_size must be at least 1".into()));
        }
        if self.thread_count == 0 {
            return Err(Error::InvalidConfig("thread_count must be at least 1".into()));
        }
        if self.populate_threads == 0 {
            return Err(Error::InvalidConfig(
                "populate_threads must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.read_ratio) {
            return Err(Error::InvalidConfig(format!(
                "read_ratio must be within [0, 1], got {}",
                self.read_ratio
            )));
        }

        let widest = (self.entry_count - 1).to_string().len();
        if self.key_width < widest {
            return Err(Error::InvalidConfig(format!(
                "key_width {} cannot hold key {}",
                self.key_width,
                self.entry_count - 1
            )));
        }
        Ok(())
    }
}

fn default_entry_count() -> u64 {
    2_000_000
}
fn default_value_size() -> usize {
    8
}
fn default_thread_count() -> usize {
    1
}
fn default_read_ratio() -> f64 {
    0.5
}
fn default_op_count() -> u64 {
    1_000_000
}
fn default_populate_threads() -> usize {
    1
}
fn default_key_width() -> usize {
    16
}
