//! Event logging subsystem for tether.
//!
//! Coordination actions are recorded in an append-only NDJSON log (one JSON
//! object per line) at `.tether/events.ndjson`, so an operator can
//! reconstruct who held what and when after the fact.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The action performed (init, acquire, reclaim, release, ...)
//! - `actor`: The holder id that performed it
//! - `resource`: Optional resource key
//! - `details`: Freeform object with action-specific details
//!
//! Each event is written with a single `write` on an `O_APPEND` handle, so
//! lines from concurrent processes do not interleave. The log grows until
//! [`EventLog::trim`] drops its oldest lines (`tether cleanup` does this).
//!
//! ```no_run
//! use tether::events::{Event, EventAction, EventLog};
//! use tether::holder::HolderId;
//! use serde_json::json;
//!
//! let log = EventLog::new(".tether/events.ndjson");
//! let event = Event::new(EventAction::Init, &HolderId::for_process())
//!     .with_details(json!({"state_dir": ".tether"}));
//! log.append(&event)?;
//! # Ok::<(), tether::error::TetherError>(())
//! ```

use crate::error::{Result, TetherError};
use crate::holder::HolderId;
use crate::resource::ResourceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Coordination state initialized
    Init,
    /// Free lock acquired
    Acquire,
    /// Expired or dead-holder lock taken over
    Reclaim,
    /// Lock released by its holder
    Release,
    /// Stale locks removed by a maintenance sweep
    Sweep,
    /// Lock removed by an operator regardless of holder
    Clear,
    /// Tracked document replaced under its lock
    Write,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Init => write!(f, "init"),
            EventAction::Acquire => write!(f, "acquire"),
            EventAction::Reclaim => write!(f, "reclaim"),
            EventAction::Release => write!(f, "release"),
            EventAction::Sweep => write!(f, "sweep"),
            EventAction::Clear => write!(f, "clear"),
            EventAction::Write => write!(f, "write"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The holder that performed the action.
    pub actor: HolderId,

    /// Resource the action applied to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKey>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(action: EventAction, actor: &HolderId) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor.clone(),
            resource: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the resource for this event.
    pub fn with_resource(mut self, resource: &ResourceKey) -> Self {
        self.resource = Some(resource.clone());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            TetherError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Handle to an NDJSON event log file.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event as one line, creating the file if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let mut line = event.to_ndjson_line()?;
        line.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                TetherError::WriteFailure(format!(
                    "failed to create events directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                TetherError::WriteFailure(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(line.as_bytes()).map_err(|e| {
            TetherError::WriteFailure(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Append an event, downgrading failures to a warning.
    ///
    /// Used on lock paths, where a failed audit write must not undo or
    /// fail a coordination step that already happened.
    pub fn record(&self, event: &Event) {
        if let Err(e) = self.append(event) {
            tracing::warn!(
                path = %self.path.display(),
                action = %event.action,
                error = %e,
                "failed to append coordination event"
            );
        }
    }

    /// Keep only the newest `keep` lines. Returns how many were dropped.
    ///
    /// The log is rewritten atomically; an event appended by another process
    /// between the read and the rename is lost.
    pub fn trim(&self, keep: usize) -> Result<usize> {
        let Some(content) = crate::fs::read_optional(&self.path)? else {
            return Ok(0);
        };

        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= keep {
            return Ok(0);
        }

        let dropped = lines.len() - keep;
        let mut kept = lines[dropped..].join("\n");
        if !kept.is_empty() {
            kept.push('\n');
        }
        crate::fs::atomic_write(&self.path, kept.as_bytes())?;
        Ok(dropped)
    }

    /// Read every event in the log, skipping lines that fail to parse.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let Some(content) = crate::fs::read_optional(&self.path)? else {
            return Ok(Vec::new());
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
