//! Pre-write coordination gate.
//!
//! Hooks consult the gate before letting a session write a file. The gate
//! reads coordination state but never changes it, and any failure to reach
//! a verdict denies the write.

use crate::config::Config;
use crate::context::TetherContext;
use crate::error::Result;
use crate::holder::HolderId;
use crate::locks::LockStore;
use chrono::Utc;
use std::path::Path;
use tracing::debug;

/// Verdict for a proposed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(String),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    /// The denial reason, if denied.
    pub fn reason(&self) -> Option<&str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Deny(reason) => Some(reason),
        }
    }
}

/// Decides whether a holder may write a path right now.
#[derive(Debug, Clone)]
pub struct CoordinationGate {
    ctx: TetherContext,
    config: Option<Config>,
}

impl CoordinationGate {
    /// Gate for `ctx`; configuration is loaded from the state directory on
    /// each check.
    pub fn new(ctx: TetherContext) -> Self {
        Self { ctx, config: None }
    }

    /// Use `config` instead of loading `config.yaml`.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Decide whether `holder` may write `path`.
    ///
    /// Untracked paths and repositories that never ran `tether init` are
    /// always allowed. A tracked path is allowed when its resource is
    /// unlocked, locked by `holder`, or locked under an expired lease.
    pub fn check_write<P: AsRef<Path>>(&self, path: P, holder: &HolderId) -> GateDecision {
        let path = path.as_ref();
        match self.evaluate(path, holder) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "coordination check failed; denying write");
                GateDecision::Deny(format!(
                    "coordination check failed for {}: {}",
                    path.display(),
                    e
                ))
            }
        }
    }

    fn evaluate(&self, path: &Path, holder: &HolderId) -> Result<GateDecision> {
        if !self.ctx.is_initialized() {
            debug!(path = %path.display(), "coordination not initialized; allowing");
            return Ok(GateDecision::Allow);
        }

        let loaded;
        let config = match &self.config {
            Some(config) => config,
            None => {
                loaded = self.ctx.load_config()?;
                &loaded
            }
        };

        let relative = self.ctx.repo_relative(path);
        if relative == self.ctx.repo_relative(self.ctx.lock_store_path()) {
            return Ok(GateDecision::Allow);
        }
        if !config.tracked_globset()?.is_match(&relative) {
            debug!(path = %relative, "path not tracked; allowing");
            return Ok(GateDecision::Allow);
        }

        let key = self.ctx.resource_key_for(path, config);
        let table = LockStore::new(self.ctx.lock_store_path()).read()?.table;

        let Some(lock) = table.find(&key) else {
            debug!(resource = %key, "resource unlocked; allowing");
            return Ok(GateDecision::Allow);
        };
        if lock.holder == *holder {
            return Ok(GateDecision::Allow);
        }
        if lock.is_expired_at(Utc::now()) {
            debug!(resource = %key, holder = %lock.holder, "lock expired; allowing");
            return Ok(GateDecision::Allow);
        }

        Ok(GateDecision::Deny(format!(
            "'{}' is locked: {}. Wait for it to be released or run `tether cleanup`.",
            key,
            lock.describe()
        )))
    }
}
