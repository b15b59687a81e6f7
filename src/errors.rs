//! Harness Error Hierarchy
//!
//! Every error in this crate is fatal to the run. The categories mirror the
//! point at which the failure happened: while preparing the store, while a
//! worker was issuing operations, or when the consistency oracle fired.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or merged
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration loaded but violates a harness rule
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection, session, table or cursor setup failed
    #[error("{stage} failed: {source}")]
    Setup {
        stage: SetupStage,
        #[source]
        source: StoreError,
    },

    /// A point operation failed inside a worker
    #[error("{role} thread {worker} {op} failed: {source}")]
    Operation {
        role: WorkerRole,
        worker: usize,
        op: OpKind,
        #[source]
        source: StoreError,
    },

    /// The store returned something other than what the mirror recorded
    #[error("read inconsistent value for key {key} - got {actual}, expected {expected}")]
    Inconsistent {
        key: String,
        expected: String,
        actual: String,
    },

    /// A worker thread panicked before reporting
    #[error("{role} thread {worker} panicked")]
    WorkerPanicked { role: WorkerRole, worker: usize },

    /// A sibling worker hit a fatal error and this one stopped early
    #[error("{role} thread {worker} aborted after a fatal error elsewhere")]
    Aborted { role: WorkerRole, worker: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A global tracing subscriber was already installed
    #[error("Failed to install log subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

/// Failures surfaced by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,

    #[error("duplicate key")]
    DuplicateKey,

    /// Bulk cursors only accept strictly increasing keys
    #[error("bulk insert key {key} is not greater than previous key {previous}")]
    OutOfOrder { key: String, previous: String },

    #[error("cursor key not set")]
    NoKey,

    #[error("cursor value not set")]
    NoValue,

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("invalid configuration string: {0}")]
    InvalidOption(String),

    #[error("home directory {0} does not exist and `create` is not set")]
    MissingHome(std::path::PathBuf),

    #[error("{0} is not supported by this cursor")]
    Unsupported(&'static str),

    #[error("Embedded database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("stored value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    OpenConnection,
    OpenSession,
    CreateTable,
    OpenCursor,
}

impl std::fmt::Display for SetupStage {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = match self {
            SetupStage::OpenConnection => "open_connection",
            SetupStage::OpenSession => "open_session",
            SetupStage::CreateTable => "create",
            SetupStage::OpenCursor => "open_cursor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Init,
    Workload,
    Reader,
    Writer,
}

impl std::fmt::Display for WorkerRole {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = match self {
            WorkerRole::Init => "init",
            WorkerRole::Workload => "workload",
            WorkerRole::Reader => "read",
            WorkerRole::Writer => "write",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Update,
    Search,
    GetValue,
}

impl std::fmt::Display for OpKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = match self {
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Search => "search",
            OpKind::GetValue => "get_value",
        };
        f.write_str(s)
    }
}

impl Error {
    pub(crate) fn setup(
        stage: SetupStage,
        source: StoreError,
    ) -> Self {
        Error::Setup { stage, source }
    }

    pub(crate) fn op(
        role: WorkerRole,
        worker: usize,
        op: OpKind,
        source: StoreError,
    ) -> Self {
        Error::Operation {
            role,
            worker,
            op,
            source,
        }
    }

    /// `Aborted` only reports that some other worker failed first.
    pub fn is_secondary(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}
