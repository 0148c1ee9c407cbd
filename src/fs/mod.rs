//! Filesystem utilities for tether.
//!
//! This module provides the atomic write primitive that every mutation of
//! coordination state goes through, plus a tolerant JSON reader.

pub mod atomic;

pub use atomic::{StagedWrite, atomic_write, atomic_write_json, stage};

use crate::error::{Result, TetherError};
use std::path::Path;

/// Read a file's raw bytes, returning `None` if it does not exist.
pub fn read_optional_bytes<P: AsRef<Path>>(path: P) -> Result<Option<Vec<u8>>> {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TetherError::IoError(format!(
            "failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Read a file to a string, returning `None` if it does not exist.
pub fn read_optional<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TetherError::IoError(format!(
            "failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}
