//! Lock store access.

use super::types::LockTable;
use crate::error::Result;
use crate::fs::{atomic_write_json, read_optional_bytes};
use std::path::{Path, PathBuf};

/// The lock store document at an explicit path.
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
}

/// The result of reading the lock store.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Parsed locks (empty if the store is missing or malformed).
    pub table: LockTable,

    /// Parse error if the file exists but is not a valid lock table.
    pub malformed: Option<String>,
}

impl LockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the store.
    ///
    /// A missing file reads as an empty table. A file that is not UTF-8 or
    /// fails to parse also reads as empty, with the reason reported in
    /// [`StoreSnapshot::malformed`]; the next write replaces it wholesale.
    /// Only I/O failures other than absence are errors.
    pub fn read(&self) -> Result<StoreSnapshot> {
        let Some(bytes) = read_optional_bytes(&self.path)? else {
            return Ok(StoreSnapshot::default());
        };

        let parsed = std::str::from_utf8(&bytes)
            .map_err(|e| format!("not valid UTF-8: {}", e))
            .and_then(|content| {
                serde_json::from_str::<LockTable>(content).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(table) => Ok(StoreSnapshot {
                table,
                malformed: None,
            }),
            Err(reason) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %reason,
                    "lock store is malformed; treating it as empty"
                );
                Ok(StoreSnapshot {
                    table: LockTable::default(),
                    malformed: Some(reason),
                })
            }
        }
    }

    /// Replace the whole store atomically.
    pub fn write(&self, table: &LockTable) -> Result<()> {
        atomic_write_json(&self.path, table)
    }

    /// Create an empty store if none exists. Returns whether one was created.
    pub fn ensure_exists(&self) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        self.write(&LockTable::default())?;
        Ok(true)
    }
}
