//! Config struct definition and default implementation.

use crate::context::STATE_DIR;
use crate::holder::DEFAULT_HOLDER_ENV_VAR;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the work registry document.
pub const WORK_REGISTRY: &str = "work-registry";

/// Name of the decision log document.
pub const DECISION_LOG: &str = "decision-log";

/// Configuration for tether.
///
/// This struct represents the contents of `.tether/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Lease length in seconds. A lock older than this is reclaimable even if
    /// its holder cannot be confirmed dead.
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: u64,

    /// Default time `acquire` keeps polling before giving up, in milliseconds.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Fixed backoff between acquire attempts, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // =========================================================================
    // Identity
    // =========================================================================
    /// Environment variable holding the session identifier.
    #[serde(default = "default_holder_env_var")]
    pub holder_env_var: String,

    // =========================================================================
    // Gate settings
    // =========================================================================
    /// Repository-relative globs of paths the coordination gate guards.
    #[serde(default = "default_tracked_paths")]
    pub tracked_paths: Vec<String>,

    /// Named tracked documents: name -> repository-relative path.
    ///
    /// A named document's resource key is its name.
    #[serde(default = "default_documents")]
    pub documents: BTreeMap<String, String>,

    // =========================================================================
    // Event log
    // =========================================================================
    /// Lines of `events.ndjson` kept by `tether cleanup`. 0 keeps everything.
    #[serde(default = "default_event_log_max_lines")]
    pub event_log_max_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_ttl_seconds: default_lock_ttl_seconds(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            holder_env_var: default_holder_env_var(),
            tracked_paths: default_tracked_paths(),
            documents: default_documents(),
            event_log_max_lines: default_event_log_max_lines(),
        }
    }
}

pub(crate) fn default_lock_ttl_seconds() -> u64 {
    300
}

pub(crate) fn default_acquire_timeout_ms() -> u64 {
    5000
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    100
}

pub(crate) fn default_holder_env_var() -> String {
    DEFAULT_HOLDER_ENV_VAR.to_string()
}

pub(crate) fn default_event_log_max_lines() -> usize {
    10_000
}

pub(crate) fn default_tracked_paths() -> Vec<String> {
    vec![
        format!("{}/*.json", STATE_DIR),
        format!("**/{}.json", WORK_REGISTRY),
        format!("**/{}.json", DECISION_LOG),
    ]
}

pub(crate) fn default_documents() -> BTreeMap<String, String> {
    [WORK_REGISTRY, DECISION_LOG]
        .into_iter()
        .map(|name| (name.to_string(), format!("{}/{}.json", STATE_DIR, name)))
        .collect()
}
