//! Error types for tether.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! A malformed lock store is deliberately absent from this enum: it is
//! recovered locally by the lock store reader and never surfaces to callers.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for tether operations.
///
/// Each variant maps to a specific exit code.
#[derive(Error, Debug)]
pub enum TetherError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// A lock could not be obtained before the acquire timeout elapsed.
    ///
    /// Recoverable: the caller may retry, proceed unguarded, or abort.
    #[error("timed out acquiring lock on '{resource}': {detail}")]
    LockTimeout { resource: String, detail: String },

    /// A write was refused by the coordination gate.
    #[error("write denied: {0}")]
    WriteDenied(String),

    /// Temp-file write or rename failed. The previous content is intact.
    #[error("write failed: {0}")]
    WriteFailure(String),

    /// Reading coordination state failed for a reason other than absence.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A tracked document exists but is not valid JSON.
    #[error("malformed document '{path}': {reason}")]
    MalformedDocument { path: String, reason: String },

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(String),
}

impl TetherError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            TetherError::UserError(_) => exit_codes::USER_ERROR,
            TetherError::MalformedDocument { .. } => exit_codes::USER_ERROR,
            TetherError::WriteFailure(_) => exit_codes::IO_FAILURE,
            TetherError::IoError(_) => exit_codes::IO_FAILURE,
            TetherError::GitError(_) => exit_codes::GIT_FAILURE,
            TetherError::LockTimeout { .. } => exit_codes::LOCK_FAILURE,
            TetherError::WriteDenied(_) => exit_codes::LOCK_FAILURE,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TetherError::LockTimeout { .. } | TetherError::WriteFailure(_)
        )
    }
}

/// Result type alias for tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;
