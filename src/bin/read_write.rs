//! Concurrent reader/writer consistency stress test.
//!
//! Runs until killed, or for `--iterations` cycles per thread. Exits 1 on the
//! first read that disagrees with the in-process mirror.

use std::process::ExitCode;

use clap::Parser;
use kvharness::cli::ReadWriteArgs;
use kvharness::consistency::run_stress;
use kvharness::consistency::StressPlan;
use kvharness::open_connection;
use kvharness::recreate_table;
use kvharness::telemetry::init_observability;
use kvharness::Backend;
use kvharness::Connection;
use kvharness::HarnessConfig;
use kvharness::MemoryConnection;
use kvharness::Result;
use kvharness::SledConnection;
use tracing::error;
use tracing::info;
use tracing::warn;

fn main() -> ExitCode {
    let args = ReadWriteArgs::parse();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_observability(&config.log, "read_write") {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let plan = StressPlan::from_config(&config, args.iterations);
    let result = match config.store.backend {
        Backend::Sled => run::<SledConnection>(&config, &plan),
        Backend::Memory => run::<MemoryConnection>(&config, &plan),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run<C: Connection>(
    config: &HarnessConfig,
    plan: &StressPlan,
) -> Result<()> {
    info!(?config, iterations = ?plan.iterations, "starting read/write stress");
    let conn: C = open_connection(&config.store.home, &config.store.connection_options)?;
    recreate_table(&conn, &config.store.table, &config.store.table_options)?;
    let report = run_stress(&conn, plan)?;
    info!(reads = report.reads, writes = report.writes, "no inconsistency observed");
    if let Err(e) = conn.close() {
        warn!("close connection: {e}");
    }
    Ok(())
}
