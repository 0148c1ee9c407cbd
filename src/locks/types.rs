//! Lock entries and the persisted lock table.

use crate::holder::HolderId;
use crate::resource::ResourceKey;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One held lock.
///
/// Entries are never edited in place; a new holder replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// The locked resource key.
    #[serde(rename = "resource_path")]
    pub resource: ResourceKey,

    /// The holder that owns the lock.
    #[serde(rename = "instance_id")]
    pub holder: HolderId,

    /// When the lock was taken (RFC3339).
    pub acquired_at: DateTime<Utc>,

    /// When the lease runs out (RFC3339).
    pub expires_at: DateTime<Utc>,
}

impl Lock {
    /// Create a lock taken at `now` with a lease of `ttl`.
    ///
    /// Timestamps are truncated to milliseconds so they survive a JSON
    /// round-trip unchanged.
    pub fn new(resource: ResourceKey, holder: HolderId, now: DateTime<Utc>, ttl: Duration) -> Self {
        let acquired_at = now.trunc_subsecs(3);
        Self {
            resource,
            holder,
            acquired_at,
            expires_at: acquired_at + ttl,
        }
    }

    /// Whether the lease has run out at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Format the lock age as a human-readable string.
    pub fn age_string(&self) -> String {
        format_duration(Utc::now().signed_duration_since(self.acquired_at))
    }

    /// Format the remaining lease as a human-readable string.
    pub fn remaining_string(&self) -> String {
        let remaining = self.expires_at.signed_duration_since(Utc::now());
        if remaining <= Duration::zero() {
            "expired".to_string()
        } else {
            format_duration(remaining)
        }
    }

    /// One-line description naming the holder and both timestamps.
    pub fn describe(&self) -> String {
        format!(
            "held by {} (acquired {}, expires {})",
            self.holder,
            self.acquired_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Format a duration the way lock ages are shown to operators.
fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// The full contents of the lock store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTable {
    #[serde(default)]
    pub locks: Vec<Lock>,
}

impl LockTable {
    /// The entry for `resource`, if any.
    pub fn find(&self, resource: &ResourceKey) -> Option<&Lock> {
        self.locks.iter().find(|lock| lock.resource == *resource)
    }

    /// Insert `lock`, replacing any entry for the same resource in place.
    pub fn upsert(&mut self, lock: Lock) {
        match self.locks.iter().position(|l| l.resource == lock.resource) {
            Some(index) => {
                let resource = lock.resource.clone();
                self.locks[index] = lock;
                // Drop any duplicates a hand-edited store may contain.
                let mut seen = false;
                self.locks.retain(|l| {
                    if l.resource != resource {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.locks.push(lock),
        }
    }

    /// Remove the entry for `resource`, returning it.
    pub fn remove(&mut self, resource: &ResourceKey) -> Option<Lock> {
        let index = self.locks.iter().position(|l| l.resource == *resource)?;
        let removed = self.locks.remove(index);
        self.locks.retain(|l| l.resource != *resource);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// A lock together with its evaluated expiry and holder liveness.
#[derive(Debug, Clone)]
pub struct LockStatus {
    pub lock: Lock,
    pub expired: bool,
    pub holder_alive: bool,
}

impl LockStatus {
    /// Whether another holder may reclaim this lock right now.
    pub fn is_stale(&self) -> bool {
        self.expired || !self.holder_alive
    }
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.expired {
            ", EXPIRED"
        } else if !self.holder_alive {
            ", HOLDER DEAD"
        } else {
            ""
        };
        write!(
            f,
            "{} (holder: {}, age: {}, expires in: {}{})",
            self.lock.resource,
            self.lock.holder,
            self.lock.age_string(),
            self.lock.remaining_string(),
            state
        )
    }
}
