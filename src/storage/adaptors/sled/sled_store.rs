use std::path::Path;

use sled::IVec;
use tracing::debug;
use tracing::trace;

use super::init_sled_db;
use crate::storage::check_bulk_order;
use crate::storage::options::ConfigString;
use crate::storage::options::CursorOptions;
use crate::storage::options::Isolation;
use crate::storage::options::SessionOptions;
use crate::storage::options::TableOptions;
use crate::Connection;
use crate::Cursor;
use crate::Session;
use crate::StoreError;
use crate::StoreResult;

/// Connection to a sled database; every table is a sled tree.
#[derive(Clone)]
pub struct SledConnection {
    db: sled::Db,
}

impl std::fmt::Debug for SledConnection {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledConnection")
            .field("tree_count", &self.db.tree_names().len())
            .finish()
    }
}

impl SledConnection {
    fn table_exists(
        db: &sled::Db,
        table: &str,
    ) -> bool {
        db.tree_names().iter().any(|name| &**name == table.as_bytes())
    }
}

impl Connection for SledConnection {
    type Session = SledSession;

    fn open(
        home: &Path,
        config: &str,
    ) -> StoreResult<Self> {
        let config = ConfigString::parse(config)?;
        let db = init_sled_db(home, &config)?;
        Ok(Self { db })
    }

    fn open_session(
        &self,
        config: Option<&str>,
    ) -> StoreResult<SledSession> {
        let options = SessionOptions::parse(config)?;
        if options.isolation != Isolation::Snapshot {
            // sled reads always observe the latest applied write
            trace!("isolation {:?} served by sled's default visibility", options.isolation);
        }
        Ok(SledSession {
            db: self.db.clone(),
            options,
        })
    }

    fn close(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

pub struct SledSession {
    db: sled::Db,
    options: SessionOptions,
}

impl SledSession {
    pub fn isolation(&self) -> Isolation {
        self.options.isolation
    }
}

impl Session for SledSession {
    type Cursor = SledCursor;

    fn create(
        &self,
        table: &str,
        config: &str,
    ) -> StoreResult<()> {
        let options = TableOptions::parse(config)?;
        if SledConnection::table_exists(&self.db, table) {
            if options.exclusive {
                return Err(StoreError::TableExists(table.to_string()));
            }
            return Ok(());
        }
        self.db.open_tree(table)?;
        debug!("created sled tree {table}");
        Ok(())
    }

    fn drop_table(
        &self,
        table: &str,
        _config: Option<&str>,
    ) -> StoreResult<()> {
        if self.db.drop_tree(table)? {
            Ok(())
        } else {
            Err(StoreError::NoSuchTable(table.to_string()))
        }
    }

    fn open_cursor(
        &self,
        table: &str,
        config: Option<&str>,
    ) -> StoreResult<SledCursor> {
        let options = CursorOptions::parse(config)?;
        if !SledConnection::table_exists(&self.db, table) {
            return Err(StoreError::NoSuchTable(table.to_string()));
        }
        let tree = self.db.open_tree(table)?;
        Ok(SledCursor {
            tree,
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

pub struct SledCursor {
    tree: sled::Tree,
    options: CursorOptions,
    key: Option<String>,
    value: Option<String>,
    found: Option<IVec>,
    last_bulk_key: Option<String>,
}

impl SledCursor {
    fn staged_key(&self) -> StoreResult<&str> {
        self.key.as_deref().ok_or(StoreError::NoKey)
    }

    fn staged_pair(&self) -> StoreResult<(&str, &str)> {
        let key = self.staged_key()?;
        let value = self.value.as_deref().ok_or(StoreError::NoValue)?;
        Ok((key, value))
    }
}

impl Cursor for SledCursor {
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
        let (key, value) = self.staged_pair()?;

        if self.options.bulk {
            check_bulk_order(self.last_bulk_key.as_deref(), key)?;
            self.tree.insert(key, value)?;
            self.last_bulk_key = Some(key.to_string());
            return Ok(());
        }

        if self.options.overwrite {
            self.tree.insert(key, value)?;
        } else if self
            .tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
            .is_err()
        {
            return Err(StoreError::DuplicateKey);
        }
        Ok(())
    }

    fn update(&mut self) -> StoreResult<()> {
        if self.options.bulk {
            return Err(StoreError::Unsupported("update"));
        }
        let (key, value) = self.staged_pair()?;

        if self.options.overwrite {
            self.tree.insert(key, value)?;
            return Ok(());
        }

        let previous = self.tree.fetch_and_update(key, |old| old.map(|_| value.as_bytes().to_vec()))?;
        match previous {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    fn search(&mut self) -> StoreResult<()> {
        if self.options.bulk {
            return Err(StoreError::Unsupported("search"));
        }
        let found = self.tree.get(self.staged_key()?)?;
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
        let value = self.found.as_ref().ok_or(StoreError::NoValue)?;
        Ok(String::from_utf8(value.to_vec())?)
    }

    fn reset(&mut self) {
        self.key = None;
        self.value = None;
        self.found = None;
    }
}
