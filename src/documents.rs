//! Guarded read-modify-write of tracked JSON documents.
//!
//! Every mutation takes the document's lock, reads the current content,
//! applies the change, replaces the file atomically and releases the lock.
//! Content is opaque JSON except for [`append_entry`], which understands the
//! two list shapes used by decision logs.

use crate::config::Config;
use crate::context::TetherContext;
use crate::error::{Result, TetherError};
use crate::events::{Event, EventAction};
use crate::fs::{atomic_write_json, read_optional};
use crate::holder::HolderId;
use crate::liveness::LivenessOracle;
use crate::locks::LockManager;
use crate::resource::ResourceKey;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A tracked document and the resource key that guards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub key: ResourceKey,
    pub path: PathBuf,
}

impl DocumentTarget {
    /// Resolve a configured document name or a file path.
    ///
    /// Relative paths are taken relative to the invoking working copy.
    pub fn resolve(ctx: &TetherContext, config: &Config, name_or_path: &str) -> Self {
        if let Some(path) = ctx.document_path(name_or_path, config) {
            return Self {
                key: ResourceKey::new(name_or_path),
                path,
            };
        }

        Self::for_path(ctx, config, Path::new(name_or_path))
    }

    /// The document at `path`, keyed by its repository-relative location.
    pub fn for_path(ctx: &TetherContext, config: &Config, path: &Path) -> Self {
        let path = if path.is_relative() {
            ctx.worktree_root.join(path)
        } else {
            path.to_path_buf()
        };
        Self {
            key: ctx.resource_key_for(&path, config),
            path,
        }
    }
}

/// Read a JSON document. A missing file is `None`.
pub fn read_document(path: &Path) -> Result<Option<Value>> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| TetherError::MalformedDocument {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Apply `modify` to a document under its lock and return the new content.
///
/// If the holder already owns the lock, the update runs inside that
/// acquisition and leaves it held. A malformed document is never
/// overwritten: the update fails with [`TetherError::MalformedDocument`].
pub fn update_document<O, F>(
    manager: &LockManager<O>,
    target: &DocumentTarget,
    holder: &HolderId,
    timeout: Duration,
    modify: F,
) -> Result<Value>
where
    O: LivenessOracle,
    F: FnOnce(Option<Value>) -> Result<Value>,
{
    let guard = manager.acquire_guard(&target.key, holder, timeout)?;

    let current = read_document(&target.path)?;
    let updated = modify(current)?;
    atomic_write_json(&target.path, &updated)?;

    tracing::info!(resource = %target.key, path = %target.path.display(), "document updated");
    manager.record(
        Event::new(EventAction::Write, holder)
            .with_resource(&target.key)
            .with_details(json!({ "path": target.path.display().to_string() })),
    );

    guard.release()?;
    Ok(updated)
}

/// Append `entry` to a list document.
///
/// The document may be a JSON array or an object with an `entries` array.
/// A missing document becomes `[entry]`.
pub fn append_entry<O: LivenessOracle>(
    manager: &LockManager<O>,
    target: &DocumentTarget,
    holder: &HolderId,
    timeout: Duration,
    entry: Value,
) -> Result<Value> {
    update_document(manager, target, holder, timeout, |current| {
        push_entry(current, entry, &target.path)
    })
}

/// Replace a document wholesale with `content`, which must be valid JSON.
pub fn replace_document<O: LivenessOracle>(
    manager: &LockManager<O>,
    target: &DocumentTarget,
    holder: &HolderId,
    timeout: Duration,
    content: &str,
) -> Result<Value> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| TetherError::UserError(format!("content is not valid JSON: {}", e)))?;
    update_document(manager, target, holder, timeout, |_| Ok(value))
}

fn push_entry(current: Option<Value>, entry: Value, path: &Path) -> Result<Value> {
    match current {
        None => Ok(Value::Array(vec![entry])),
        Some(Value::Array(mut entries)) => {
            entries.push(entry);
            Ok(Value::Array(entries))
        }
        Some(Value::Object(mut object)) => match object.get_mut("entries") {
            Some(Value::Array(entries)) => {
                entries.push(entry);
                Ok(Value::Object(object))
            }
            _ => Err(not_a_list(path)),
        },
        Some(_) => Err(not_a_list(path)),
    }
}

fn not_a_list(path: &Path) -> TetherError {
    TetherError::UserError(format!(
        "cannot append to '{}': expected a JSON array or an object with an 'entries' array",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DECISION_LOG, WORK_REGISTRY};
    use crate::events::EventLog;
    use crate::locks::LockStore;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        ctx: TetherContext,
        config: Config,
        manager: LockManager<fn(&HolderId) -> bool>,
    }

    fn alive(_: &HolderId) -> bool {
        true
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let ctx = TetherContext::at(temp_dir.path());
        std::fs::create_dir_all(&ctx.state_dir).unwrap();
        let manager = LockManager::new(LockStore::new(ctx.lock_store_path()))
            .with_poll_interval(Duration::from_millis(10))
            .with_event_log(EventLog::new(ctx.events_file()))
            .with_oracle(alive as fn(&HolderId) -> bool);
        Fixture {
            _temp_dir: temp_dir,
            ctx,
            config: Config::default(),
            manager,
        }
    }

    impl Fixture {
        fn target(&self, name_or_path: &str) -> DocumentTarget {
            DocumentTarget::resolve(&self.ctx, &self.config, name_or_path)
        }
    }

    #[test]
    fn test_resolve_named_document() {
        let f = fixture();
        let target = f.target(DECISION_LOG);

        assert_eq!(target.key, ResourceKey::new(DECISION_LOG));
        assert_eq!(target.path, f.ctx.state_dir.join("decision-log.json"));
    }

    #[test]
    fn test_resolve_path_to_named_document_uses_name_key() {
        let f = fixture();
        let path = f.ctx.state_dir.join("work-registry.json");
        let target = f.target(path.to_str().unwrap());

        assert_eq!(target.key, ResourceKey::new(WORK_REGISTRY));
    }

    #[test]
    fn test_resolve_relative_path() {
        let f = fixture();
        let target = f.target("data/queue.json");

        assert_eq!(target.key, ResourceKey::new("data/queue.json"));
        assert_eq!(target.path, f.ctx.worktree_root.join("data/queue.json"));
    }

    #[test]
    fn test_read_missing_document() {
        let temp_dir = TempDir::new().unwrap();
        assert!(read_document(&temp_dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn test_read_malformed_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{oops").unwrap();

        let err = read_document(&path).unwrap_err();
        assert!(matches!(err, TetherError::MalformedDocument { .. }));
    }

    #[test]
    fn test_update_document_writes_and_releases() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);
        let holder = HolderId::new("a");

        let updated = update_document(&f.manager, &target, &holder, Duration::ZERO, |current| {
            assert!(current.is_none());
            Ok(json!({"tasks": ["t1"]}))
        })
        .unwrap();

        assert_eq!(updated, json!({"tasks": ["t1"]}));
        assert_eq!(read_document(&target.path).unwrap(), Some(updated));
        assert!(f.manager.current(&target.key).unwrap().is_none());
    }

    #[test]
    fn test_update_document_blocked_by_foreign_lock() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);
        f.manager
            .acquire(&target.key, &HolderId::new("other"), Duration::ZERO)
            .unwrap();

        let err = update_document(
            &f.manager,
            &target,
            &HolderId::new("a"),
            Duration::ZERO,
            |_| Ok(json!({})),
        )
        .unwrap_err();

        assert!(matches!(err, TetherError::LockTimeout { .. }));
        assert!(!target.path.exists());
    }

    #[test]
    fn test_update_inside_existing_acquisition_keeps_lock() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);
        let holder = HolderId::new("a");
        f.manager.acquire(&target.key, &holder, Duration::ZERO).unwrap();

        update_document(&f.manager, &target, &holder, Duration::ZERO, |_| Ok(json!([]))).unwrap();

        assert_eq!(
            f.manager.current(&target.key).unwrap().unwrap().holder,
            holder
        );
    }

    #[test]
    fn test_failed_modification_leaves_document_and_releases_lock() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);
        std::fs::write(&target.path, "{\"v\": 1}").unwrap();

        let err = update_document(
            &f.manager,
            &target,
            &HolderId::new("a"),
            Duration::ZERO,
            |_| Err(TetherError::UserError("nope".to_string())),
        )
        .unwrap_err();

        assert!(matches!(err, TetherError::UserError(_)));
        assert_eq!(std::fs::read_to_string(&target.path).unwrap(), "{\"v\": 1}");
        assert!(f.manager.current(&target.key).unwrap().is_none());
    }

    #[test]
    fn test_malformed_document_is_not_overwritten() {
        let f = fixture();
        let target = f.target(DECISION_LOG);
        std::fs::write(&target.path, "[1, 2,").unwrap();

        let err = append_entry(
            &f.manager,
            &target,
            &HolderId::new("a"),
            Duration::ZERO,
            json!({"decision": "x"}),
        )
        .unwrap_err();

        assert!(matches!(err, TetherError::MalformedDocument { .. }));
        assert_eq!(std::fs::read_to_string(&target.path).unwrap(), "[1, 2,");
    }

    #[test]
    fn test_append_entry_shapes() {
        let f = fixture();
        let target = f.target(DECISION_LOG);
        let holder = HolderId::new("a");

        let first = append_entry(&f.manager, &target, &holder, Duration::ZERO, json!(1)).unwrap();
        assert_eq!(first, json!([1]));

        let second = append_entry(&f.manager, &target, &holder, Duration::ZERO, json!(2)).unwrap();
        assert_eq!(second, json!([1, 2]));

        std::fs::write(&target.path, r#"{"version": 1, "entries": []}"#).unwrap();
        let wrapped = append_entry(&f.manager, &target, &holder, Duration::ZERO, json!("d")).unwrap();
        assert_eq!(wrapped, json!({"version": 1, "entries": ["d"]}));
    }

    #[test]
    fn test_append_to_non_list_fails() {
        let f = fixture();
        let target = f.target(DECISION_LOG);
        std::fs::write(&target.path, r#"{"entries": 3}"#).unwrap();

        let err = append_entry(&f.manager, &target, &HolderId::new("a"), Duration::ZERO, json!(1))
            .unwrap_err();
        assert!(err.to_string().contains("cannot append"));
    }

    #[test]
    fn test_replace_document() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);

        let value = replace_document(
            &f.manager,
            &target,
            &HolderId::new("a"),
            Duration::ZERO,
            r#"{"sessions": {}}"#,
        )
        .unwrap();

        assert_eq!(value, json!({"sessions": {}}));
        assert_eq!(read_document(&target.path).unwrap(), Some(value));
    }

    #[test]
    fn test_replace_rejects_invalid_json_without_locking() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);

        let err = replace_document(&f.manager, &target, &HolderId::new("a"), Duration::ZERO, "{")
            .unwrap_err();

        assert!(matches!(err, TetherError::UserError(_)));
        assert!(!f.manager.store().exists());
    }

    #[test]
    fn test_write_event_recorded() {
        let f = fixture();
        let target = f.target(WORK_REGISTRY);

        replace_document(&f.manager, &target, &HolderId::new("a"), Duration::ZERO, "[]").unwrap();

        let actions: Vec<EventAction> = EventLog::new(f.ctx.events_file())
            .read_all()
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![EventAction::Acquire, EventAction::Write, EventAction::Release]
        );
    }
}
