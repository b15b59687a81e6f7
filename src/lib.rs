//! Benchmark and consistency-check drivers for an embedded key-value engine.
//!
//! - [`populate`]: parallel bulk load of a fixed keyspace
//! - [`workload`]: randomized point reads and updates with live throughput
//! - [`consistency`]: per-key locked reader/writer stress test
//! - [`check`]: write a dataset and read it back
//!
//! The engine is reached through the [`Connection`] / [`Session`] / [`Cursor`]
//! traits; `sled` and an in-process map are provided.

pub mod check;
pub mod cli;
pub mod consistency;
pub mod keyspace;
pub mod monitor;
pub mod populate;
pub mod telemetry;
pub mod workload;

mod config;
mod errors;
mod storage;

pub use config::*;
pub use errors::*;
pub use storage::*;

#[cfg(test)]
mod consistency_test;
#[cfg(test)]
mod keyspace_test;
#[cfg(test)]
mod telemetry_test;
#[cfg(test)]
mod workload_test;
