//! Capability set the harness needs from an embedded key-value engine.
//!
//! `Connection` → `Session` → `Cursor`, with string keys and string values.
//! Every configuration string is forwarded to the backend as is.
mod adaptors;
pub mod options;


use std::path::Path;

pub use adaptors::*;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use crate::Error;
use crate::Result;
use crate::SetupStage;
use crate::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A handle to an opened store, shared by every worker thread.
pub trait Connection: Send + Sync {
    type Session: Session;

    fn open(
        home: &Path,
        config: &str,
    ) -> StoreResult<Self>
    where
        Self: Sized;

    fn open_session(
        &self,
        config: Option<&str>,
    ) -> StoreResult<Self::Session>;

    fn close(&self) -> StoreResult<()>;
}

/// Per-thread context. Sessions are not shared between threads.
pub trait Session: Send {
    type Cursor: Cursor;

    /// Creates `table`; a no-op when it exists unless `exclusive` is set.
    fn create(
        &self,
        table: &str,
        config: &str,
    ) -> StoreResult<()>;

    fn drop_table(
        &self,
        table: &str,
        config: Option<&str>,
    ) -> StoreResult<()>;

    fn open_cursor(
        &self,
        table: &str,
        config: Option<&str>,
    ) -> StoreResult<Self::Cursor>;

    fn close(self) -> StoreResult<()>
    where
        Self: Sized;
}

/// Positioned access to one table. Key and value are staged with the setters
/// and consumed by `insert`, `update` and `search`.
#[cfg_attr(test, automock)]
pub trait Cursor: Send {
    fn set_key(
        &mut self,
        key: &str,
    );

    fn set_value(
        &mut self,
        value: &str,
    );

    fn insert(&mut self) -> StoreResult<()>;

    fn update(&mut self) -> StoreResult<()>;

    /// Positions on the staged key; `NotFound` when absent.
    fn search(&mut self) -> StoreResult<()>;

    /// Value at the position established by the last successful `search`.
    fn get_value(&self) -> StoreResult<String>;

    /// Releases the position and clears staged key and value.
    fn reset(&mut self);
}

/// Bulk cursors reject any key that does not sort after the previous one.
pub(crate) fn check_bulk_order(
    previous: Option<&str>,
    key: &str,
) -> StoreResult<()> {
    match previous {
        Some(prev) if key <= prev => Err(StoreError::OutOfOrder {
            key: key.to_string(),
            previous: prev.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Opens the store, logging the outcome.
#[instrument(skip(config))]
pub fn open_connection<C: Connection>(
    home: &Path,
    config: &str,
) -> Result<C> {
    let conn = C::open(home, config).map_err(|e| Error::setup(SetupStage::OpenConnection, e))?;
    info!("opened store connection at {}", home.display());
    Ok(conn)
}

/// Drops `table` if present (errors ignored) and creates it afresh.
#[instrument(skip(conn, table_options))]
pub fn recreate_table<C: Connection>(
    conn: &C,
    table: &str,
    table_options: &str,
) -> Result<()> {
    let session = conn
        .open_session(None)
        .map_err(|e| Error::setup(SetupStage::OpenSession, e))?;

    if let Err(e) = session.drop_table(table, None) {
        debug!("drop {table} ignored: {e}");
    }
    info!("existing table dropped");

    session
        .create(table, table_options)
        .map_err(|e| Error::setup(SetupStage::CreateTable, e))?;
    info!("new table created");

    // close errors are not fatal once the table exists
    if let Err(e) = session.close() {
        debug!("setup session close: {e}");
    }
    Ok(())
}

/// Creates `table` without dropping it first.
pub fn create_table<C: Connection>(
    conn: &C,
    table: &str,
    table_options: &str,
) -> Result<()> {
    let session = conn
        .open_session(None)
        .map_err(|e| Error::setup(SetupStage::OpenSession, e))?;
    session
        .create(table, table_options)
        .map_err(|e| Error::setup(SetupStage::CreateTable, e))?;
    if let Err(e) = session.close() {
        debug!("setup session close: {e}");
    }
    Ok(())
}

/// Session plus cursor for one worker thread.
pub fn open_worker_cursor<C: Connection>(
    conn: &C,
    session_options: Option<&str>,
    table: &str,
    cursor_options: Option<&str>,
) -> Result<(C::Session, <C::Session as Session>::Cursor)> {
    let session = conn
        .open_session(session_options)
        .map_err(|e| Error::setup(SetupStage::OpenSession, e))?;
    let cursor = session
        .open_cursor(table, cursor_options)
        .map_err(|e| Error::setup(SetupStage::OpenCursor, e))?;
    Ok((session, cursor))
}
