//! Command implementations for tether.
//!
//! The dispatcher resolves the repository context and holder identity once,
//! then routes each CLI command to its handler. Handlers take the resolved
//! [`Invocation`] so they can be driven directly in tests.

mod check;
mod cleanup;
mod document;
mod init;
mod lock;
mod status;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::TetherContext;
use crate::documents::DocumentTarget;
use crate::error::{Result, TetherError};
use crate::holder::HolderId;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Context and identity shared by every command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub ctx: TetherContext,

    /// Holder id given on the command line, if any.
    pub holder: Option<String>,
}

impl Invocation {
    pub fn new(ctx: TetherContext, holder: Option<String>) -> Self {
        Self { ctx, holder }
    }

    /// The acting holder: `--holder`, else the configured session variable,
    /// else this process.
    pub fn holder(&self, config: &Config) -> HolderId {
        match &self.holder {
            Some(id) if !id.trim().is_empty() => HolderId::new(id.trim()),
            _ => HolderId::from_env(&config.holder_env_var),
        }
    }

    /// Resolve a document name, resource key, or path given on the command
    /// line. Relative paths are relative to the current directory.
    pub fn target(&self, config: &Config, arg: &str) -> Result<DocumentTarget> {
        if config.documents.contains_key(arg) {
            return Ok(DocumentTarget::resolve(&self.ctx, config, arg));
        }
        let path = absolutize(Path::new(arg))?;
        Ok(DocumentTarget::for_path(&self.ctx, config, &path))
    }
}

/// Dispatch a parsed command line.
pub fn dispatch(cli: Cli) -> Result<()> {
    let ctx = match (resolve_context(cli.root.as_deref()), &cli.command) {
        // Outside any repository there is no coordination state to enforce.
        (Err(err), Command::Check(_)) => {
            tracing::debug!(error = %err, "no repository context; allowing write");
            return Ok(());
        }
        (ctx, _) => ctx?,
    };
    let invocation = Invocation::new(ctx, cli.holder);

    match cli.command {
        Command::Init => init::cmd_init(&invocation),
        Command::Status(args) => status::cmd_status(&invocation, args),
        Command::Cleanup(args) => cleanup::cmd_cleanup(&invocation, args),
        Command::Check(args) => check::cmd_check(&invocation, args),
        Command::Acquire(args) => lock::cmd_acquire(&invocation, args),
        Command::Release(args) => lock::cmd_release(&invocation, args),
        Command::Write(args) => document::cmd_write(&invocation, args),
        Command::Append(args) => document::cmd_append(&invocation, args),
    }
}

/// `--root` if given, otherwise the repository around the current directory.
fn resolve_context(root: Option<&Path>) -> Result<TetherContext> {
    match root {
        Some(root) => Ok(TetherContext::at(absolutize(root)?)),
        None => TetherContext::resolve(),
    }
}

/// Resolve `path` against the current directory.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| {
        TetherError::UserError(format!("failed to get current working directory: {}", e))
    })?;
    Ok(cwd.join(path))
}

/// `--timeout-ms` if given, otherwise the configured default.
fn timeout_or_default(timeout_ms: Option<u64>, config: &Config) -> Duration {
    timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.acquire_timeout())
}
