//! Exit code constants for the tether CLI.
//!
//! - 0: Success (for `check`: the write is allowed)
//! - 1: User error (bad args, invalid config, malformed document)
//! - 2: I/O failure (unreadable state, failed atomic write)
//! - 3: Git operation failure
//! - 4: Lock failure (acquire timed out, or `check` denied the write)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid state, or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// I/O failure: coordination state could not be read or written.
pub const IO_FAILURE: i32 = 2;

/// Git operation failure while resolving the repository layout.
pub const GIT_FAILURE: i32 = 3;

/// Lock failure: lock held elsewhere until the timeout, or write denied.
pub const LOCK_FAILURE: i32 = 4;
