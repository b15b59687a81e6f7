//! `random_workload <entry_count> <value_size> <thread_count> <read_ratio> <op_count>`
//!
//! Recreates the table, bulk loads it, then runs the read/update mix and
//! reports throughput.

use std::process::ExitCode;

use clap::Parser;
use kvharness::cli::RandomWorkloadArgs;
use kvharness::open_connection;
use kvharness::telemetry::init_observability;
use kvharness::workload::run_benchmark;
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
    let args = RandomWorkloadArgs::parse();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_observability(&config.log, "random_workload") {
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
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run<C: Connection>(config: &HarnessConfig) -> Result<()> {
    info!(?config, "starting random workload");
    let conn: C = open_connection(&config.store.home, &config.store.connection_options)?;
    let (populated, report) = run_benchmark(&conn, config)?;
    info!(
        inserted = populated.inserted,
        reads = report.total_reads(),
        writes = report.total_writes(),
        "random workload finished"
    );
    if let Err(e) = conn.close() {
        warn!("close connection: {e}");
    }
    Ok(())
}
