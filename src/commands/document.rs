//! Implementation of the `tether write` and `tether append` commands.

use super::{Invocation, timeout_or_default};
use crate::cli::{AppendArgs, WriteArgs};
use crate::documents::{append_entry, replace_document};
use crate::error::{Result, TetherError};
use crate::locks::LockManager;
use serde_json::Value;
use std::io::Read;

/// Execute the `tether write` command.
pub fn cmd_write(invocation: &Invocation, args: WriteArgs) -> Result<()> {
    let content = match &args.file {
        Some(file) => std::fs::read_to_string(file).map_err(|e| {
            TetherError::UserError(format!("failed to read '{}': {}", file.display(), e))
        })?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| TetherError::IoError(format!("failed to read stdin: {}", e)))?;
            buffer
        }
    };

    let ctx = &invocation.ctx;
    ctx.ensure_initialized()?;
    let config = ctx.load_config()?;
    let holder = invocation.holder(&config);
    let target = invocation.target(&config, &args.document)?;
    let manager = LockManager::for_context(ctx, &config);

    replace_document(
        &manager,
        &target,
        &holder,
        timeout_or_default(args.timeout_ms, &config),
        &content,
    )?;
    println!("Wrote {}", target.path.display());
    Ok(())
}

/// Execute the `tether append` command.
pub fn cmd_append(invocation: &Invocation, args: AppendArgs) -> Result<()> {
    let entry: Value = serde_json::from_str(&args.entry)
        .map_err(|e| TetherError::UserError(format!("entry is not valid JSON: {}", e)))?;

    let ctx = &invocation.ctx;
    ctx.ensure_initialized()?;
    let config = ctx.load_config()?;
    let holder = invocation.holder(&config);
    let target = invocation.target(&config, &args.document)?;
    let manager = LockManager::for_context(ctx, &config);

    append_entry(
        &manager,
        &target,
        &holder,
        timeout_or_default(args.timeout_ms, &config),
        entry,
    )?;
    println!("Appended entry to {}", target.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TetherContext;
    use crate::documents::read_document;
    use crate::holder::HolderId;
    use crate::resource::ResourceKey;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn initialized(holder: &str) -> (TempDir, Invocation) {
        let temp_dir = TempDir::new().unwrap();
        let invocation = Invocation::new(TetherContext::at(temp_dir.path()), Some(holder.to_string()));
        std::fs::create_dir_all(&invocation.ctx.state_dir).unwrap();
        (temp_dir, invocation)
    }

    #[test]
    fn test_write_from_file() {
        let (temp_dir, invocation) = initialized("session-a");
        let source = temp_dir.path().join("new.json");
        std::fs::write(&source, r#"{"sessions": ["a"]}"#).unwrap();

        cmd_write(
            &invocation,
            WriteArgs {
                document: "work-registry".to_string(),
                file: Some(source),
                timeout_ms: Some(0),
            },
        )
        .unwrap();

        let path = invocation.ctx.state_dir.join("work-registry.json");
        assert_eq!(read_document(&path).unwrap(), Some(json!({"sessions": ["a"]})));
    }

    #[test]
    fn test_write_missing_file_is_user_error() {
        let (temp_dir, invocation) = initialized("session-a");

        let err = cmd_write(
            &invocation,
            WriteArgs {
                document: "work-registry".to_string(),
                file: Some(temp_dir.path().join("missing.json")),
                timeout_ms: Some(0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, TetherError::UserError(_)));
    }

    #[test]
    fn test_append_entries() {
        let (_temp_dir, invocation) = initialized("session-a");
        for n in 1..=2 {
            cmd_append(
                &invocation,
                AppendArgs {
                    document: "decision-log".to_string(),
                    entry: format!(r#"{{"n": {}}}"#, n),
                    timeout_ms: Some(0),
                },
            )
            .unwrap();
        }

        let path = invocation.ctx.state_dir.join("decision-log.json");
        assert_eq!(read_document(&path).unwrap(), Some(json!([{"n": 1}, {"n": 2}])));
    }

    #[test]
    fn test_append_blocked_by_other_holder() {
        let (_temp_dir, invocation) = initialized("session-b");
        let config = invocation.ctx.load_config().unwrap();
        LockManager::for_context(&invocation.ctx, &config)
            .acquire(
                &ResourceKey::new("decision-log"),
                &HolderId::new("session-a"),
                Duration::ZERO,
            )
            .unwrap();

        let err = cmd_append(
            &invocation,
            AppendArgs {
                document: "decision-log".to_string(),
                entry: "1".to_string(),
                timeout_ms: Some(0),
            },
        )
        .unwrap_err();

        assert!(matches!(err, TetherError::LockTimeout { .. }));
    }

    #[test]
    fn test_append_rejects_invalid_entry() {
        let (_temp_dir, invocation) = initialized("session-a");
        let err = cmd_append(
            &invocation,
            AppendArgs {
                document: "decision-log".to_string(),
                entry: "{not json".to_string(),
                timeout_ms: Some(0),
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("not valid JSON"));
    }
}
