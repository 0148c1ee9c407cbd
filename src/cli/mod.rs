//! CLI argument parsing for tether.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tether: file-based lock coordination for concurrent agent sessions.
///
/// Sessions working in separate worktrees of one repository take named
/// locks in a shared `.tether/locks.json` before mutating shared JSON
/// documents. Locks held by dead processes or past their lease are
/// reclaimed automatically.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Repository root to coordinate in, instead of discovering it with git.
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Holder id to act as (default: the configured session variable,
    /// falling back to `pid:<pid>@<host>`).
    #[arg(long, global = true, value_name = "ID")]
    pub holder: Option<String>,

    /// Emit debug diagnostics on stderr (overridden by TETHER_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for tether.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enable coordination in the current repository.
    ///
    /// Creates `.tether/` under the main worktree with a default
    /// config.yaml and an empty lock store. Safe to run repeatedly.
    Init,

    /// List held locks with their expiry and holder liveness.
    Status(StatusArgs),

    /// Remove expired and dead-holder locks.
    ///
    /// With `--resource <KEY> --force`, removes that lock regardless of
    /// who holds it.
    Cleanup(CleanupArgs),

    /// Ask the coordination gate whether a file may be written.
    ///
    /// Exits 0 when allowed and 4 when denied, printing the reason to
    /// stderr.
    Check(CheckArgs),

    /// Acquire the lock guarding a document or path.
    Acquire(AcquireArgs),

    /// Release a lock held by this holder. Releasing a lock held by
    /// anyone else does nothing.
    Release(ReleaseArgs),

    /// Replace a tracked document under its lock.
    Write(WriteArgs),

    /// Append a JSON entry to a list document (e.g. the decision log)
    /// under its lock.
    Append(AppendArgs),
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Print locks as a JSON array.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Clear only this resource (document name, key, or path).
    #[arg(long, value_name = "KEY")]
    pub resource: Option<String>,

    /// Clear the resource even if its holder is alive.
    #[arg(long, requires = "resource")]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// File about to be written.
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct AcquireArgs {
    /// Document name, resource key, or file path.
    pub target: String,

    /// How long to keep polling a busy lock (default: acquire_timeout_ms).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Lease length for this lock (default: lock_ttl_seconds).
    #[arg(long, value_name = "SECONDS")]
    pub ttl_seconds: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Document name, resource key, or file path.
    pub target: String,
}

#[derive(Parser, Debug)]
pub struct WriteArgs {
    /// Document name or file path.
    pub document: String,

    /// Read the new content from this file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// How long to wait for the document's lock (default: acquire_timeout_ms).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct AppendArgs {
    /// Document name or file path.
    pub document: String,

    /// JSON value to append.
    pub entry: String,

    /// How long to wait for the document's lock (default: acquire_timeout_ms).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
