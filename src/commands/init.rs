//! Implementation of the `tether init` command.
//!
//! Creates the shared state directory under the main worktree:
//!
//! 1. `.tether/` itself
//! 2. `config.yaml` with defaults (if missing)
//! 3. an empty `locks.json` (if missing)
//! 4. `.gitignore` keeping machine-local files out of commits
//!
//! Running it again leaves existing state untouched.

use super::Invocation;
use crate::config::Config;
use crate::error::{Result, TetherError};
use crate::events::{Event, EventAction, EventLog};
use crate::fs::atomic_write;
use crate::locks::LockStore;
use serde_json::json;

/// Entries that must never be committed.
const GITIGNORE_ENTRIES: &[&str] = &["locks.json", "events.ndjson", ".*.tmp"];

/// Execute the `tether init` command.
pub fn cmd_init(invocation: &Invocation) -> Result<()> {
    let ctx = &invocation.ctx;
    let already_initialized = ctx.is_initialized();

    std::fs::create_dir_all(&ctx.state_dir).map_err(|e| {
        TetherError::IoError(format!(
            "failed to create state directory '{}': {}",
            ctx.state_dir.display(),
            e
        ))
    })?;

    let config_created = if ctx.config_path().exists() {
        false
    } else {
        let yaml = format!(
            "# tether coordination settings. Unknown keys are ignored.\n{}",
            Config::default().to_yaml()?
        );
        atomic_write(ctx.config_path(), yaml.as_bytes())?;
        true
    };

    // Refuse to continue on a broken config rather than papering over it.
    let config = ctx.load_config()?;

    let store_created = LockStore::new(ctx.lock_store_path()).ensure_exists()?;
    ensure_gitignore(ctx.state_dir.join(".gitignore").as_path())?;

    let holder = invocation.holder(&config);
    EventLog::new(ctx.events_file()).record(&Event::new(EventAction::Init, &holder).with_details(
        json!({
            "state_dir": ctx.state_dir.display().to_string(),
            "config_created": config_created,
            "store_created": store_created,
        }),
    ));

    if already_initialized {
        println!("tether already initialized at {}", ctx.state_dir.display());
    } else {
        println!("Initialized tether at {}", ctx.state_dir.display());
    }
    if config_created {
        println!("  created {}", ctx.config_path().display());
    }
    if store_created {
        println!("  created {}", ctx.lock_store_path().display());
    }

    Ok(())
}

/// Add any missing machine-local entries to the state directory's .gitignore.
fn ensure_gitignore(path: &std::path::Path) -> Result<()> {
    let existing = std::fs::read_to_string(path).unwrap_or_default();
    let missing: Vec<&str> = GITIGNORE_ENTRIES
        .iter()
        .copied()
        .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let mut content = existing;
    if content.is_empty() {
        content.push_str("# Machine-local coordination state (never commit)\n");
    } else if !content.ends_with('\n') {
        content.push('\n');
    }
    for entry in missing {
        content.push_str(entry);
        content.push('\n');
    }
    atomic_write(path, content.as_bytes())
}
