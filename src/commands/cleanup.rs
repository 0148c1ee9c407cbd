//! Implementation of the `tether cleanup` command.
//!
//! Without arguments, sweeps every expired or dead-holder lock and trims the
//! event log to `event_log_max_lines`. With `--resource <KEY> --force`,
//! removes one lock no matter who holds it.

use super::Invocation;
use crate::cli::CleanupArgs;
use crate::error::{Result, TetherError};
use crate::events::EventLog;
use crate::locks::LockManager;

/// Execute the `tether cleanup` command.
pub fn cmd_cleanup(invocation: &Invocation, args: CleanupArgs) -> Result<()> {
    let ctx = &invocation.ctx;
    ctx.ensure_initialized()?;
    let config = ctx.load_config()?;
    let actor = invocation.holder(&config);
    let manager = LockManager::for_context(ctx, &config);

    let Some(resource) = args.resource else {
        let removed = manager.sweep(&actor)?;
        if removed.is_empty() {
            println!("No stale locks.");
        } else {
            println!("Removed {} stale lock(s):", removed.len());
            for lock in &removed {
                println!("  {} ({})", lock.resource, lock.describe());
            }
        }
        if config.event_log_max_lines > 0 {
            let dropped = EventLog::new(ctx.events_file()).trim(config.event_log_max_lines)?;
            if dropped > 0 {
                println!("Trimmed {} old event(s).", dropped);
            }
        }
        return Ok(());
    };

    let target = invocation.target(&config, &resource)?;
    if !args.force {
        return Err(TetherError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock whose holder is still active breaks mutual exclusion.\n\
             Run `tether cleanup` to remove only expired or dead-holder locks, or:\n  \
             tether cleanup --resource {} --force",
            target.key
        )));
    }

    match manager.force_clear(&target.key, &actor)? {
        Some(lock) => println!("Cleared lock on {} ({})", target.key, lock.describe()),
        None => println!("No lock on {}.", target.key),
    }
    Ok(())
}
