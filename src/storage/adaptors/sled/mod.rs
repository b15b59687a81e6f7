mod sled_store;

pub use sled_store::*;


use std::path::Path;

use crate::storage::options::ConfigString;
use crate::StoreError;

/// Default cache when the connection string carries no `cache_size`
const DEFAULT_CACHE_CAPACITY: u64 = 1024 * 1024 * 1024; //1GB

/// Builds the sled database from a connection configuration string.
///
/// Understood keys: `create`, `cache_size`, `flush_every_ms`, `compression`,
/// `mode` (`high_throughput` | `low_space`), `in_memory`. Engine tuning such as
/// `direct_io`, `buffer_alignment` or `mmap` has no sled counterpart and is
/// passed through without effect.
pub(super) fn init_sled_db(
    home: &Path,
    config: &ConfigString,
) -> Result<sled::Db, StoreError> {
    tracing::debug!("init_sled_db from path: {:?}", home);

    if !config.flag("create") && !home.exists() {
        return Err(StoreError::MissingHome(home.to_path_buf()));
    }

    let cache_capacity = config.size("cache_size")?.unwrap_or(DEFAULT_CACHE_CAPACITY);
    let flush_every_ms = match config.value("flush_every_ms") {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map_err(|_| StoreError::InvalidOption(format!("flush_every_ms={raw}")))?,
        ),
        None => Some(500),
    };
    let mode = match config.value("mode") {
        None | Some("high_throughput") => sled::Mode::HighThroughput,
        Some("low_space") => sled::Mode::LowSpace,
        Some(other) => return Err(StoreError::InvalidOption(format!("mode={other}"))),
    };

    config.log_ignored(
        "connection",
        &[
            "create",
            "cache_size",
            "flush_every_ms",
            "compression",
            "mode",
            "in_memory",
        ],
    );

    sled::Config::default()
        .path(home)
        .temporary(config.flag("in_memory"))
        .cache_capacity(cache_capacity)
        .flush_every_ms(flush_every_ms)
        .use_compression(config.flag("compression"))
        .mode(mode)
        .open()
        .map_err(|e| {
            tracing::warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                home,
                e
            );
            e.into()
        })
}
