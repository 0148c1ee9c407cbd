//! Holder identity.
//!
//! A holder is the logical owner of a lock: one agent session. The id comes
//! from an environment variable set by the host session (default
//! `TETHER_SESSION_ID`). When the variable is absent a fallback of the form
//! `pid:<pid>@<host>` is synthesized; that form is the only one the liveness
//! oracle can inspect.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default environment variable carrying the session identifier.
pub const DEFAULT_HOLDER_ENV_VAR: &str = "TETHER_SESSION_ID";

const PID_PREFIX: &str = "pid:";

/// Identity of a lock holder, compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    /// Wrap an explicit holder id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the holder for this process from `env_var`, falling back to
    /// [`HolderId::for_process`] when the variable is unset or blank.
    pub fn from_env(env_var: &str) -> Self {
        match std::env::var(env_var) {
            Ok(value) if !value.trim().is_empty() => Self(value.trim().to_string()),
            _ => Self::for_process(),
        }
    }

    /// Holder id encoding the current process id and host.
    pub fn for_process() -> Self {
        Self::for_pid(std::process::id(), &local_hostname())
    }

    /// Holder id encoding an arbitrary pid and host.
    pub fn for_pid(pid: u32, host: &str) -> Self {
        Self(format!("{}{}@{}", PID_PREFIX, pid, host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The process id encoded in this holder, if any.
    pub fn pid(&self) -> Option<u32> {
        let rest = self.0.strip_prefix(PID_PREFIX)?;
        let digits = rest.split_once('@').map_or(rest, |(pid, _)| pid);
        digits.parse().ok()
    }

    /// The host recorded alongside the pid, if any.
    pub fn host(&self) -> Option<&str> {
        self.0
            .strip_prefix(PID_PREFIX)?
            .split_once('@')
            .map(|(_, host)| host)
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HolderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Local hostname, or `unknown` if it cannot be determined.
pub(crate) fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
