//! Implementation of the `tether check` command (pre-write hook).

use super::{Invocation, absolutize};
use crate::cli::CheckArgs;
use crate::error::{Result, TetherError};
use crate::gate::{CoordinationGate, GateDecision};
use crate::holder::HolderId;

/// Execute the `tether check` command.
///
/// An allowed write exits 0 silently; a denied one fails with
/// [`TetherError::WriteDenied`] (exit 4).
pub fn cmd_check(invocation: &Invocation, args: CheckArgs) -> Result<()> {
    let path = absolutize(&args.path)?;
    let holder = gate_holder(invocation);

    match CoordinationGate::new(invocation.ctx.clone()).check_write(&path, &holder) {
        GateDecision::Allow => Ok(()),
        GateDecision::Deny(reason) => Err(TetherError::WriteDenied(reason)),
    }
}

/// Resolve the holder without failing: the gate itself reports config
/// errors as denials.
fn gate_holder(invocation: &Invocation) -> HolderId {
    let config = invocation.ctx.load_config().unwrap_or_default();
    invocation.holder(&config)
}
