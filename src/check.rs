//! Write-then-read-back check of a fixed dataset.
//!
//! Unlike the other drivers a miss or a wrong value does not stop the run:
//! every key is checked and the failures are counted.

use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::keyspace::KeyEncoding;
use crate::Cursor;
use crate::Error;
use crate::OpKind;
use crate::Result;
use crate::WorkerRole;

pub const KEY_ENCODING: KeyEncoding = KeyEncoding::Prefixed {
    prefix: "key",
    width: 8,
};

pub const VALUE_ENCODING: KeyEncoding = KeyEncoding::Prefixed {
    prefix: "value",
    width: 8,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub checked: u64,
    pub missing: u64,
    pub mismatched: u64,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.missing == 0 && self.mismatched == 0
    }
}

/// Inserts `key%08d -> value%08d` for every index below `entry_count`.
#[instrument(skip(cursor))]
pub fn write_dataset<C: Cursor>(
    cursor: &mut C,
    entry_count: u64,
) -> Result<()> {
    let mut key = String::new();
    let mut value = String::new();
    for i in 0..entry_count {
        KEY_ENCODING.encode_into(i, &mut key);
        VALUE_ENCODING.encode_into(i, &mut value);
        cursor.set_key(&key);
        cursor.set_value(&value);
        cursor
            .insert()
            .map_err(|e| Error::op(WorkerRole::Init, 0, OpKind::Insert, e))?;
    }
    info!("inserted {entry_count} entries");
    Ok(())
}

/// Re-reads every key written by [`write_dataset`] and counts what is wrong.
#[instrument(skip(cursor))]
pub fn verify_dataset<C: Cursor>(
    cursor: &mut C,
    entry_count: u64,
) -> CheckReport {
    let mut report = CheckReport::default();
    let mut key = String::new();
    let mut expected = String::new();
    for i in 0..entry_count {
        KEY_ENCODING.encode_into(i, &mut key);
        VALUE_ENCODING.encode_into(i, &mut expected);
        cursor.set_key(&key);
        report.checked += 1;

        if let Err(e) = cursor.search() {
            warn!("search {key} failed: {e}");
            report.missing += 1;
            continue;
        }
        match cursor.get_value() {
            Ok(actual) if actual == expected => {}
            Ok(actual) => {
                warn!("read inconsistent value for key {key} - got {actual}, expected {expected}");
                report.mismatched += 1;
            }
            Err(e) => {
                warn!("get_value {key} failed: {e}");
                report.missing += 1;
            }
        }
    }
    info!(
        checked = report.checked,
        missing = report.missing,
        mismatched = report.mismatched,
        "read-back finished"
    );
    report
}

/// Writes the dataset, resets the cursor, then verifies it.
pub fn run_check<C: Cursor>(
    cursor: &mut C,
    entry_count: u64,
) -> Result<CheckReport> {
    write_dataset(cursor, entry_count)?;
    cursor.reset();
    Ok(verify_dataset(cursor, entry_count))
}
