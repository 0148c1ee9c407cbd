//! tether: file-based lock coordination for concurrent agent sessions.
//!
//! This is the main entry point for the `tether` CLI. It parses arguments,
//! sets up diagnostics, dispatches to the appropriate command handler, and
//! handles errors with proper exit codes.

mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod documents;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod gate;
pub mod git;
pub mod holder;
pub mod liveness;
pub mod locks;
mod logging;
pub mod resource;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
