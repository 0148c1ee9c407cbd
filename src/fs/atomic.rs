//! Atomic filesystem operations for tether.
//!
//! Every mutation of coordination state (the lock store and the tracked
//! documents) goes through this module, so a reader never observes a
//! partially written file.
//!
//! # Implementation Strategy
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename the temporary file onto the target
//!
//! Step 3 is the only point at which the target changes. `rename()` within a
//! single filesystem replaces the destination atomically on POSIX, and
//! `std::fs::rename` replaces existing files on Windows as well.
//!
//! # Important Notes
//!
//! - The temporary file lives next to the target so the rename never crosses
//!   a filesystem boundary
//! - Temporary names embed the process id and a per-process counter, so
//!   concurrent writers (in this or other processes) never share a temp file
//! - On crash, a temporary file may remain (named `.{filename}.{pid}.{n}.tmp`)

use crate::error::{Result, TetherError};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fully written temporary file that has not yet replaced its target.
///
/// Dropping a `StagedWrite` without calling [`StagedWrite::commit`] removes
/// the temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Path of the staged temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Path that [`StagedWrite::commit`] will replace.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file onto the target.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp_path, &self.target).map_err(|e| {
            TetherError::WriteFailure(format!(
                "failed to atomically replace '{}': {}",
                self.target.display(),
                e
            ))
        })?;
        self.committed = true;

        // Persist the directory entry as well as the file contents.
        #[cfg(unix)]
        if let Some(parent) = self.target.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Write `content` to a temporary sibling of `path` without touching `path`.
///
/// Missing parent directories are created.
pub fn stage<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<StagedWrite> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            TetherError::WriteFailure(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let staged = StagedWrite {
        temp_path: generate_temp_path(path)?,
        target: path.to_path_buf(),
        committed: false,
    };

    // On failure `staged` is dropped here, which removes the partial temp file.
    write_and_sync(&staged.temp_path, content)?;

    Ok(staged)
}

/// Atomically write bytes to a file.
///
/// On error the target keeps its previous content (or stays absent) and the
/// temporary file is removed. Retrying is always safe.
///
/// # Example
///
/// ```no_run
/// use tether::fs::atomic_write;
/// use std::path::Path;
///
/// atomic_write(Path::new(".tether/work-registry.json"), b"{}\n")?;
/// # Ok::<(), tether::error::TetherError>(())
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    stage(path, content)?.commit()
}

/// Atomically write a value as pretty-printed JSON followed by a newline.
pub fn atomic_write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut json = serde_json::to_string_pretty(value).map_err(|e| {
        TetherError::WriteFailure(format!(
            "failed to serialize JSON for '{}': {}",
            path.display(),
            e
        ))
    })?;
    json.push('\n');
    atomic_write(path, json.as_bytes())
}

/// Generate a unique temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TetherError::WriteFailure(format!("invalid file path '{}'", target.display()))
        })?;

    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}.{}.tmp", filename, std::process::id(), n);
    Ok(parent.join(temp_name))
}

/// Write content to a file and sync to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        TetherError::WriteFailure(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content)
        .map_err(|e| TetherError::WriteFailure(format!("failed to write temporary file: {}", e)))?;

    file.sync_all().map_err(|e| {
        TetherError::WriteFailure(format!("failed to sync temporary file to disk: {}", e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("locks.json");

        atomic_write(&file_path, b"{\"locks\": []}").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "{\"locks\": []}");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("decision-log.json");
        fs::write(&file_path, "[]").unwrap();

        atomic_write(&file_path, b"[{\"decision\": \"use rename\"}]").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "[{\"decision\": \"use rename\"}]");
    }

    #[test]
    fn test_atomic_write_round_trip_binary() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("binary.bin");
        let content: Vec<u8> = (0..=255u8).collect();

        atomic_write(&file_path, &content).unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), content);
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join(".tether").join("nested").join("doc.json");

        atomic_write(&file_path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{}");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("work-registry.json");

        atomic_write(&file_path, b"{}").unwrap();
        atomic_write(&file_path, b"{\"items\": []}").unwrap();

        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_abort_between_write_and_rename_keeps_target() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("decision-log.json");
        let original = b"[{\"id\": 1}]\n".to_vec();
        fs::write(&file_path, &original).unwrap();

        let staged = stage(&file_path, b"[{\"id\": 1}, {\"id\": 2}]").unwrap();
        assert!(staged.temp_path().exists());
        assert_eq!(staged.target(), file_path.as_path());
        // Target is untouched while the new content sits in the temp file.
        assert_eq!(fs::read(&file_path).unwrap(), original);

        // Abort: drop without committing.
        let temp_path = staged.temp_path().to_path_buf();
        drop(staged);

        assert_eq!(fs::read(&file_path).unwrap(), original);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_failed_rename_keeps_target_and_cleans_temp() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("locks.json");
        fs::write(&file_path, "original").unwrap();

        let staged = stage(&file_path, b"replacement").unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        // Make the rename fail by removing the staged file out from under it.
        fs::remove_file(&temp_path).unwrap();

        let result = staged.commit();
        assert!(matches!(result, Err(TetherError::WriteFailure(_))));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original");
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_atomic_write_json_is_pretty_with_newline() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("doc.json");

        atomic_write_json(&file_path, &serde_json::json!({"locks": []})).unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, serde_json::json!({"locks": []}));
    }

    #[test]
    fn test_generate_temp_path_is_unique_sibling() {
        let target = Path::new("/some/path/locks.json");
        let a = generate_temp_path(target).unwrap();
        let b = generate_temp_path(target).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent().unwrap(), Path::new("/some/path"));
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".locks.json."));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn test_concurrent_writers_same_target_never_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("shared.json");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = file_path.clone();
                std::thread::spawn(move || {
                    let body = format!("{{\"writer\": {}, \"pad\": \"{}\"}}", i, "x".repeat(4096));
                    for _ in 0..10 {
                        atomic_write(&path, body.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Whichever writer won last, the file is one complete document.
        let content = fs::read_to_string(&file_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(parsed["writer"].is_u64());
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }
}
