//! Implementation of the `tether status` command.

use super::Invocation;
use crate::cli::StatusArgs;
use crate::error::{Result, TetherError};
use crate::locks::{LockManager, LockStatus};
use serde_json::{Value, json};

/// Execute the `tether status` command.
pub fn cmd_status(invocation: &Invocation, args: StatusArgs) -> Result<()> {
    let ctx = &invocation.ctx;
    ctx.ensure_initialized()?;
    let config = ctx.load_config()?;

    let statuses = LockManager::for_context(ctx, &config).list()?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&status_json(&statuses))
            .map_err(|e| TetherError::UserError(format!("failed to render status: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Active locks ({}):", statuses.len());
    println!();
    for status in &statuses {
        let lock = &status.lock;
        println!("  {}:", lock.resource);
        println!("    Holder:     {}", lock.holder);
        println!("    Acquired:   {} ({} ago)", lock.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"), lock.age_string());
        println!("    Expires:    {} ({})", lock.expires_at.format("%Y-%m-%d %H:%M:%S UTC"), lock.remaining_string());
        if status.expired {
            println!("    Status:     EXPIRED");
        } else if !status.holder_alive {
            println!("    Status:     HOLDER DEAD");
        }
        println!();
    }

    let stale = statuses.iter().filter(|s| s.is_stale()).count();
    if stale > 0 {
        println!(
            "Note: {} lock(s) are reclaimable. Run `tether cleanup` to remove them.",
            stale
        );
    }

    Ok(())
}

fn status_json(statuses: &[LockStatus]) -> Value {
    Value::Array(
        statuses
            .iter()
            .map(|status| {
                json!({
                    "resource": status.lock.resource,
                    "holder": status.lock.holder,
                    "acquired_at": status.lock.acquired_at,
                    "expires_at": status.lock.expires_at,
                    "expired": status.expired,
                    "holder_alive": status.holder_alive,
                })
            })
            .collect(),
    )
}
