use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Which engine the drivers talk to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded on-disk engine
    #[default]
    Sled,
    /// In-process ordered map, for dry runs and tests
    Memory,
}

/// Store-level settings.
///
/// The `*_options` strings are engine configuration strings. The drivers never
/// look inside them; they are handed to the backend untouched.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Home directory of the store
    #[serde(default = "default_home")]
    pub home: PathBuf,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_connection_options")]
    pub connection_options: String,

    /// Used by workload, reader and writer sessions
    #[serde(default = "default_session_options")]
    pub session_options: String,

    #[serde(default = "default_table_options")]
    pub table_options: String,

    /// Used by population cursors
    #[serde(default = "default_bulk_cursor_options")]
    pub bulk_cursor_options: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            home: default_home(),
            table: default_table(),
            connection_options: default_connection_options(),
            session_options: default_session_options(),
            table_options: default_table_options(),
            bulk_cursor_options: default_bulk_cursor_options(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(Error::InvalidConfig("store.table cannot be empty".into()));
        }
        if self.backend == Backend::Sled && self.home.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "store.home is required by the sled backend".into(),
            ));
        }
        Ok(())
    }
}

fn default_home() -> PathBuf {
    PathBuf::from("/tmp/kvharness/home")
}
fn default_table() -> String {
    "lsm:karaage".to_string()
}
fn default_connection_options() -> String {
    "create,direct_io=[data],buffer_alignment=512B,mmap=false".to_string()
}
fn default_session_options() -> String {
    "isolation=read-uncommitted".to_string()
}
fn default_table_options() -> String {
    "key_format=S,value_format=S,allocation_size=512B,internal_page_max=512B,leaf_page_max=512B"
        .to_string()
}
fn default_bulk_cursor_options() -> String {
    "bulk".to_string()
}
