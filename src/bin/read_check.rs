//! Writes `key%08d -> value%08d` pairs, then reads every key back.
//!
//! Missing keys and wrong values are logged and counted; the exit status is 1
//! if there were any.

use std::process::ExitCode;

use clap::Parser;
use kvharness::check::run_check;
use kvharness::check::CheckReport;
use kvharness::cli::ReadCheckArgs;
use kvharness::open_connection;
use kvharness::open_worker_cursor;
use kvharness::recreate_table;
use kvharness::telemetry::init_observability;
use kvharness::Backend;
use kvharness::Connection;
use kvharness::HarnessConfig;
use kvharness::MemoryConnection;
use kvharness::Result;
use kvharness::Session;
use kvharness::SledConnection;
use tracing::error;
use tracing::info;
use tracing::warn;

fn main() -> ExitCode {
    let args = ReadCheckArgs::parse();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_observability(&config.log, "read_check") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match config.store.backend {
        Backend::Sled => run::<SledConnection>(&config),
        Backend::Memory => run::<MemoryConnection>(&config),
    };
    match result {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(report) => {
            error!(
                missing = report.missing,
                mismatched = report.mismatched,
                "read-back check failed"
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run<C: Connection>(config: &HarnessConfig) -> Result<CheckReport> {
    info!(?config, "starting read-back check");
    let conn: C = open_connection(&config.store.home, &config.store.connection_options)?;
    recreate_table(&conn, &config.store.table, &config.store.table_options)?;

    let (session, mut cursor) = open_worker_cursor(&conn, None, &config.store.table, None)?;
    let report = run_check(&mut cursor, config.workload.entry_count)?;
    drop(cursor);
    if let Err(e) = session.close() {
        warn!("close session: {e}");
    }
    if let Err(e) = conn.close() {
        warn!("close connection: {e}");
    }
    Ok(report)
}
