use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// When set, events are also appended to `<dir>/<binary>.log`
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}
