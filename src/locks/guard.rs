//! RAII lock guard implementation.

use super::manager::{Acquisition, LockManager};
use super::types::Lock;
use crate::error::Result;
use crate::holder::HolderId;
use crate::liveness::LivenessOracle;
use crate::resource::ResourceKey;

/// RAII guard for a held lock.
///
/// When dropped, the lock is released through its manager. If the release
/// fails, a warning is logged but no panic occurs. A guard obtained by
/// re-entering a lock the holder already owned does not release it: the
/// outer acquisition stays responsible for that.
pub struct LockGuard<'a, O: LivenessOracle> {
    manager: &'a LockManager<O>,
    resource: ResourceKey,
    holder: HolderId,
    acquisition: Acquisition,
    released: bool,
}

impl<'a, O: LivenessOracle> LockGuard<'a, O> {
    pub(super) fn new(
        manager: &'a LockManager<O>,
        resource: ResourceKey,
        holder: HolderId,
        acquisition: Acquisition,
    ) -> Self {
        // Re-entrant guards behave as if already released.
        let released = !acquisition.is_new();
        Self {
            manager,
            resource,
            holder,
            acquisition,
            released,
        }
    }

    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    pub fn lock(&self) -> &Lock {
        self.acquisition.lock()
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    /// Manually release the lock, surfacing any error.
    pub fn release(mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.manager.release(&self.resource, &self.holder)?;
        Ok(())
    }
}

impl<O: LivenessOracle> Drop for LockGuard<'_, O> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.manager.release(&self.resource, &self.holder)
        {
            tracing::warn!(
                resource = %self.resource,
                holder = %self.holder,
                error = %e,
                "failed to release lock"
            );
        }
    }
}

impl<O: LivenessOracle> std::fmt::Debug for LockGuard<'_, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("resource", &self.resource)
            .field("holder", &self.holder)
            .field("released", &self.released)
            .finish()
    }
}
