//! Locking subsystem for tether.
//!
//! All locks live in one JSON document, the lock store
//! (`.tether/locks.json`):
//!
//! ```json
//! {"locks": [{"resource_path": "decision-log", "instance_id": "session-a",
//!             "acquired_at": "...", "expires_at": "..."}]}
//! ```
//!
//! # Protocol
//!
//! There is no OS-level file lock. Every mutation reads the whole store,
//! edits it in memory and replaces it with an atomic rename. Because two
//! processes can both read before either writes, `acquire` re-reads the store
//! after its write and only reports success if its own entry survived;
//! otherwise it backs off and tries again until its timeout.
//!
//! A lock is reclaimable once its lease has expired or its holder's process
//! is confirmed dead by the [`LivenessOracle`](crate::liveness::LivenessOracle).
//! This is best-effort mutual exclusion, not consensus: a suspended holder
//! that resumes after being reclaimed can still write.
//!
//! # RAII Guards
//!
//! [`LockManager::acquire_guard`] returns a guard that releases the lock when
//! dropped. If the release fails during drop, a warning is logged and the
//! program continues; the lease bounds how long the orphan survives.

mod guard;
mod manager;
mod store;
mod types;


pub use guard::LockGuard;
pub use manager::{Acquisition, LockManager};
pub use store::{LockStore, StoreSnapshot};
pub use types::{Lock, LockStatus, LockTable};
