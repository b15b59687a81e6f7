use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use crate::storage::check_bulk_order;
use crate::storage::options::ConfigString;
use crate::storage::options::CursorOptions;
use crate::storage::options::SessionOptions;
use crate::storage::options::TableOptions;
use crate::Connection;
use crate::Cursor;
use crate::Session;
use crate::StoreError;
use crate::StoreResult;

/// When writes become observable to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// A write is visible as soon as the call returns
    #[default]
    Immediate,
    /// Writes queue up until `MemoryConnection::publish_pending` is called
    Deferred,
}

#[derive(Debug, Default)]
struct MemoryTable {
    data: RwLock<BTreeMap<String, String>>,
    pending: Mutex<Vec<(String, String)>>,
}

impl MemoryTable {
    fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.data.read().contains_key(key) || self.pending.lock().iter().any(|(k, _)| k == key)
    }

    fn publish(&self) -> usize {
        let pending: Vec<_> = self.pending.lock().drain(..).collect();
        let published = pending.len();
        let mut data = self.data.write();
        for (key, value) in pending {
            data.insert(key, value);
        }
        published
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: RwLock<HashMap<String, Arc<MemoryTable>>>,
    visibility: RwLock<Visibility>,
}

impl MemoryInner {
    fn table(
        &self,
        name: &str,
    ) -> StoreResult<Arc<MemoryTable>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }

    fn write(
        &self,
        table: &MemoryTable,
        key: &str,
        value: &str,
    ) {
        match *self.visibility.read() {
            Visibility::Immediate => {
                table.data.write().insert(key.to_string(), value.to_string());
            }
            Visibility::Deferred => {
                table.pending.lock().push((key.to_string(), value.to_string()));
            }
        }
    }
}

/// In-process ordered store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    inner: Arc<MemoryInner>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visibility(
        &self,
        visibility: Visibility,
    ) {
        *self.inner.visibility.write() = visibility;
    }

    /// Makes every deferred write visible; returns how many were applied.
    pub fn publish_pending(&self) -> usize {
        let tables: Vec<_> = self.inner.tables.read().values().cloned().collect();
        let published = tables.iter().map(|t| t.publish()).sum();
        trace!("published {published} deferred writes");
        published
    }

    /// Number of visible entries in `table`.
    pub fn len(
        &self,
        table: &str,
    ) -> StoreResult<usize> {
        Ok(self.inner.table(table)?.data.read().len())
    }

    pub fn is_empty(
        &self,
        table: &str,
    ) -> StoreResult<bool> {
        Ok(self.len(table)? == 0)
    }
}

impl Connection for MemoryConnection {
    type Session = MemorySession;

    fn open(
        home: &Path,
        config: &str,
    ) -> StoreResult<Self> {
        let config = ConfigString::parse(config)?;
        config.log_ignored("connection", &[]);
        debug!("memory store ignores home {:?}", home);
        Ok(Self::new())
    }

    fn open_session(
        &self,
        config: Option<&str>,
    ) -> StoreResult<MemorySession> {
        SessionOptions::parse(config)?;
        Ok(MemorySession {
            inner: self.inner.clone(),
        })
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemorySession {
    inner: Arc<MemoryInner>,
}

impl Session for MemorySession {
    type Cursor = MemoryCursor;

    fn create(
        &self,
        table: &str,
        config: &str,
    ) -> StoreResult<()> {
        let options = TableOptions::parse(config)?;
        let mut tables = self.inner.tables.write();
        if tables.contains_key(table) {
            if options.exclusive {
                return Err(StoreError::TableExists(table.to_string()));
            }
            return Ok(());
        }
        tables.insert(table.to_string(), Arc::new(MemoryTable::default()));
        Ok(())
    }

    fn drop_table(
        &self,
        table: &str,
        _config: Option<&str>,
    ) -> StoreResult<()> {
        match self.inner.tables.write().remove(table) {
            Some(_) => Ok(()),
            None => Err(StoreError::NoSuchTable(table.to_string())),
        }
    }

    fn open_cursor(
        &self,
        table: &str,
        config: Option<&str>,
    ) -> StoreResult<MemoryCursor> {
        let options = CursorOptions::parse(config)?;
        Ok(MemoryCursor {
            table: self.inner.table(table)?,
            inner: self.inner.clone(),
            options,
            key: None,
            value: None,
            found: None,
            last_bulk_key: None,
        })
    }

    fn close(self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryCursor {
    table: Arc<MemoryTable>,
    inner: Arc<MemoryInner>,
    options: CursorOptions,
    key: Option<String>,
    value: Option<String>,
    found: Option<String>,
    last_bulk_key: Option<String>,
}

impl Cursor for MemoryCursor {
    fn set_key(
        &mut self,
        key: &str,
    ) {
        self.key = Some(key.to_string());
        self.found = None;
    }

    fn set_value(
        &mut self,
        value: &str,
    ) {
        self.value = Some(value.to_string());
    }

    fn insert(&mut self) -> StoreResult<()> {
        let key = self.key.as_deref().ok_or(StoreError::NoKey)?;
        let value = self.value.as_deref().ok_or(StoreError::NoValue)?;

        if self.options.bulk {
            check_bulk_order(self.last_bulk_key.as_deref(), key)?;
        } else if !self.options.overwrite && self.table.contains(key) {
            return Err(StoreError::DuplicateKey);
        }
        self.inner.write(&self.table, key, value);

        if self.options.bulk {
            self.last_bulk_key = Some(key.to_string());
        }
        Ok(())
    }

    fn update(&mut self) -> StoreResult<()> {
        if self.options.bulk {
            return Err(StoreError::Unsupported("update"));
        }
        let key = self.key.as_deref().ok_or(StoreError::NoKey)?;
        let value = self.value.as_deref().ok_or(StoreError::NoValue)?;

        if !self.options.overwrite && !self.table.contains(key) {
            return Err(StoreError::NotFound);
        }
        self.inner.write(&self.table, key, value);
        Ok(())
    }

    fn search(&mut self) -> StoreResult<()> {
        if self.options.bulk {
            return Err(StoreError::Unsupported("search"));
        }
        let key = self.key.as_deref().ok_or(StoreError::NoKey)?;
        let found = self.table.data.read().get(key).cloned();
        match found {
            Some(value) => {
                self.found = Some(value);
                Ok(())
            }
            None => {
                self.found = None;
                Err(StoreError::NotFound)
            }
        }
    }

    fn get_value(&self) -> StoreResult<String> {
        self.found.clone().ok_or(StoreError::NoValue)
    }

    fn reset(&mut self) {
        self.key = None;
        self.value = None;
        self.found = None;
    }
}
