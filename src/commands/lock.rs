//! Implementation of the `tether acquire` and `tether release` commands.

use super::{Invocation, timeout_or_default};
use crate::cli::{AcquireArgs, ReleaseArgs};
use crate::config::MAX_LOCK_TTL_SECONDS;
use crate::error::{Result, TetherError};
use crate::locks::{Acquisition, LockManager};

/// Execute the `tether acquire` command.
pub fn cmd_acquire(invocation: &Invocation, args: AcquireArgs) -> Result<()> {
    let ctx = &invocation.ctx;
    ctx.ensure_initialized()?;
    let config = ctx.load_config()?;
    let holder = invocation.holder(&config);
    let target = invocation.target(&config, &args.target)?;

    if holder.pid() == Some(std::process::id()) {
        tracing::warn!(
            holder = %holder,
            "holder id names this short-lived process; set {} or pass --holder to keep the lock",
            config.holder_env_var
        );
    }

    let mut manager = LockManager::for_context(ctx, &config);
    if let Some(seconds) = args.ttl_seconds {
        if seconds == 0 || seconds > MAX_LOCK_TTL_SECONDS {
            return Err(TetherError::UserError(format!(
                "--ttl-seconds must be between 1 and {}",
                MAX_LOCK_TTL_SECONDS
            )));
        }
        manager = manager.with_ttl(chrono::Duration::seconds(seconds as i64));
    }

    let timeout = timeout_or_default(args.timeout_ms, &config);
    match manager.acquire(&target.key, &holder, timeout)? {
        Acquisition::Acquired(lock) => println!("Acquired {} ({})", target.key, lock.describe()),
        Acquisition::Reclaimed { lock, previous } => println!(
            "Acquired {} ({}); reclaimed stale lock from {}",
            target.key,
            lock.describe(),
            previous.holder
        ),
        Acquisition::AlreadyHeld(lock) => {
            println!("Already holding {} ({})", target.key, lock.describe())
        }
    }
    Ok(())
}

/// Execute the `tether release` command.
pub fn cmd_release(invocation: &Invocation, args: ReleaseArgs) -> Result<()> {
    let ctx = &invocation.ctx;
    ctx.ensure_initialized()?;
    let config = ctx.load_config()?;
    let holder = invocation.holder(&config);
    let target = invocation.target(&config, &args.target)?;

    if LockManager::for_context(ctx, &config).release(&target.key, &holder)? {
        println!("Released {}", target.key);
    } else {
        println!("{} is not held by {}; nothing to release.", target.key, holder);
    }
    Ok(())
}
