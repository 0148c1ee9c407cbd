//! Liveness oracle for lock holders.
//!
//! Liveness only ever lets a lock be reclaimed *earlier* than its expiry.
//! Reporting a dead holder as alive just means waiting out the lease;
//! reporting a live holder as dead would break mutual exclusion. Every
//! uncertain case therefore answers "alive".

use crate::holder::{HolderId, local_hostname};

/// Decides whether the process behind a holder id is still running.
pub trait LivenessOracle {
    fn is_alive(&self, holder: &HolderId) -> bool;
}

impl<F> LivenessOracle for F
where
    F: Fn(&HolderId) -> bool,
{
    fn is_alive(&self, holder: &HolderId) -> bool {
        self(holder)
    }
}

/// Oracle that probes local processes with a zero signal.
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    host: String,
}

impl ProcessOracle {
    pub fn new() -> Self {
        Self {
            host: local_hostname(),
        }
    }
}

impl Default for ProcessOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessOracle for ProcessOracle {
    fn is_alive(&self, holder: &HolderId) -> bool {
        let Some(pid) = holder.pid() else {
            return true;
        };
        // A pid from another machine says nothing about this one.
        if holder.host().is_some_and(|host| host != self.host) {
            return true;
        }
        process_liveness(pid) != ProcessLiveness::Dead
    }
}

/// Result of probing a single pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessLiveness {
    Alive,
    Dead,
    /// The probe failed for a reason other than "no such process".
    Unknown,
}

/// Probe `pid` with `kill(pid, 0)`.
///
/// - Success: alive
/// - `ESRCH`: dead
/// - anything else (notably `EPERM`): unknown
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn process_liveness(pid: u32) -> ProcessLiveness {
    // pid 0 and negative values address process groups, not a process.
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return ProcessLiveness::Unknown;
    };
    if pid <= 0 {
        return ProcessLiveness::Unknown;
    }

    // SAFETY: signal 0 performs permission and existence checks only and
    // delivers nothing; `pid` is a positive single-process id.
    let ret = unsafe { libc::kill(pid, 0) };
    if ret == 0 {
        return ProcessLiveness::Alive;
    }

    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::ESRCH) => ProcessLiveness::Dead,
        _ => ProcessLiveness::Unknown,
    }
}

#[cfg(not(unix))]
pub fn process_liveness(_pid: u32) -> ProcessLiveness {
    ProcessLiveness::Unknown
}
