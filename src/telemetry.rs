use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use crate::Error;
use crate::LogConfig;
use crate::Result;

/// Installs the global subscriber: stderr always, plus `<dir>/<name>.log`
/// when a log directory is configured.
///
/// `RUST_LOG` wins over `config.filter`. Keep the returned guard alive until
/// exit or buffered file lines are lost.
pub fn init_observability(
    config: &LogConfig,
    name: &str,
) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(&config.filter)?);

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let log_file = open_file_for_append(&dir.join(format!("{name}.log")))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(env_filter(&config.filter)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn env_filter(fallback: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(fallback)
            .map_err(|e| Error::InvalidConfig(format!("log filter {fallback:?}: {e}"))),
    }
}

pub(crate) fn open_file_for_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    Ok(file)
}
