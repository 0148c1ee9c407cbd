//! Configuration model for tether.
//!
//! This module defines the Config struct that represents `.tether/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, and validation of config values.

mod model;
mod operations;


pub use model::Config;
pub use model::{DECISION_LOG, WORK_REGISTRY};
pub use operations::MAX_LOCK_TTL_SECONDS;
