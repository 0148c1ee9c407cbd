//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr so stdout stays machine-readable for hooks.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`EnvFilter` syntax).
pub const LOG_ENV_VAR: &str = "TETHER_LOG";

/// Build the filter: `TETHER_LOG` if set, otherwise `warn`, or `debug`
/// when verbose output was requested.
pub fn build_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "warn" };
    match std::env::var(LOG_ENV_VAR) {
        Ok(spec) if !spec.trim().is_empty() => {
            EnvFilter::try_new(&spec).unwrap_or_else(|_| EnvFilter::new(default))
        }
        _ => EnvFilter::new(default),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
