//! Lock acquisition, release, listing, and sweeping.

use super::guard::LockGuard;
use super::store::LockStore;
use super::types::{Lock, LockStatus, LockTable};
use crate::config::Config;
use crate::context::TetherContext;
use crate::error::{Result, TetherError};
use crate::events::{Event, EventAction, EventLog};
use crate::holder::HolderId;
use crate::liveness::{LivenessOracle, ProcessOracle};
use crate::resource::ResourceKey;
use chrono::Utc;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default lease length when none is configured.
const DEFAULT_TTL_SECONDS: i64 = 300;

/// Default backoff between acquire attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a successful `acquire` came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// The resource was free.
    Acquired(Lock),
    /// The previous entry had expired or its holder was dead.
    Reclaimed { lock: Lock, previous: Lock },
    /// The caller already held a live lock on the resource; nothing changed.
    AlreadyHeld(Lock),
}

impl Acquisition {
    pub fn lock(&self) -> &Lock {
        match self {
            Acquisition::Acquired(lock)
            | Acquisition::Reclaimed { lock, .. }
            | Acquisition::AlreadyHeld(lock) => lock,
        }
    }

    /// Whether this call wrote a new entry (as opposed to re-entering).
    pub fn is_new(&self) -> bool {
        !matches!(self, Acquisition::AlreadyHeld(_))
    }
}

/// Outcome of a single acquire attempt.
enum Attempt {
    Done(Acquisition),
    /// A live lock owned by someone else.
    Held(Lock),
    /// Our write was overwritten before we could confirm it.
    LostRace(Option<Lock>),
}

/// Arbitrates named locks over a [`LockStore`].
#[derive(Debug, Clone)]
pub struct LockManager<O = ProcessOracle> {
    store: LockStore,
    oracle: O,
    ttl: chrono::Duration,
    poll_interval: Duration,
    events: Option<EventLog>,
}

impl LockManager<ProcessOracle> {
    /// Manager over `store` with default lease, poll interval, and the
    /// process liveness oracle.
    pub fn new(store: LockStore) -> Self {
        Self {
            store,
            oracle: ProcessOracle::new(),
            ttl: chrono::Duration::seconds(DEFAULT_TTL_SECONDS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            events: None,
        }
    }

    /// Manager for a resolved context, configured from `config` and logging
    /// to the context's event log.
    pub fn for_context(ctx: &TetherContext, config: &Config) -> Self {
        Self::new(LockStore::new(ctx.lock_store_path()))
            .with_ttl(config.lock_ttl())
            .with_poll_interval(config.poll_interval())
            .with_event_log(EventLog::new(ctx.events_file()))
    }
}

impl<O: LivenessOracle> LockManager<O> {
    /// Replace the liveness oracle.
    pub fn with_oracle<P: LivenessOracle>(self, oracle: P) -> LockManager<P> {
        LockManager {
            store: self.store,
            oracle,
            ttl: self.ttl,
            poll_interval: self.poll_interval,
            events: self.events,
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &LockStore {
        &self.store
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Acquire `resource` for `holder`, polling until `timeout` elapses.
    ///
    /// A zero timeout makes exactly one attempt. Re-acquiring a live lock the
    /// holder already owns succeeds without touching the store.
    pub fn acquire(
        &self,
        resource: &ResourceKey,
        holder: &HolderId,
        timeout: Duration,
    ) -> Result<Acquisition> {
        let deadline = Instant::now() + timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let blocker = match self.try_acquire(resource, holder)? {
                Attempt::Done(acquisition) => {
                    self.log_acquisition(holder, &acquisition);
                    return Ok(acquisition);
                }
                Attempt::Held(lock) => Some(lock),
                Attempt::LostRace(winner) => {
                    debug!(resource = %resource, attempt, "lost lock store write race");
                    winner
                }
            };

            let now = Instant::now();
            if now >= deadline {
                let detail = match blocker {
                    Some(lock) => lock.describe(),
                    None => format!("lost {} consecutive write race(s)", attempt),
                };
                debug!(resource = %resource, holder = %holder, attempt, "acquire timed out");
                return Err(TetherError::LockTimeout {
                    resource: resource.to_string(),
                    detail,
                });
            }

            debug!(resource = %resource, attempt, "lock busy; backing off");
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Like [`LockManager::acquire`], but returns a guard that releases on drop.
    pub fn acquire_guard(
        &self,
        resource: &ResourceKey,
        holder: &HolderId,
        timeout: Duration,
    ) -> Result<LockGuard<'_, O>> {
        let acquisition = self.acquire(resource, holder, timeout)?;
        Ok(LockGuard::new(self, resource.clone(), holder.clone(), acquisition))
    }

    fn try_acquire(&self, resource: &ResourceKey, holder: &HolderId) -> Result<Attempt> {
        let snapshot = self.store.read()?;
        let now = Utc::now();

        let previous = match snapshot.table.find(resource) {
            Some(current) if !current.is_expired_at(now) => {
                if current.holder == *holder {
                    return Ok(Attempt::Done(Acquisition::AlreadyHeld(current.clone())));
                }
                if self.oracle.is_alive(&current.holder) {
                    return Ok(Attempt::Held(current.clone()));
                }
                Some(current.clone())
            }
            other => other.cloned(),
        };

        let lock = Lock::new(resource.clone(), holder.clone(), now, self.ttl);
        let mut table = snapshot.table;
        table.upsert(lock.clone());
        self.store.write(&table)?;

        // Read-then-write is not atomic across processes: confirm we won.
        let confirmed = self.store.read()?;
        match confirmed.table.find(resource) {
            Some(current) if *current == lock => Ok(Attempt::Done(match previous {
                Some(previous) if previous.holder != *holder => {
                    Acquisition::Reclaimed { lock, previous }
                }
                _ => Acquisition::Acquired(lock),
            })),
            other => Ok(Attempt::LostRace(other.cloned())),
        }
    }

    fn log_acquisition(&self, holder: &HolderId, acquisition: &Acquisition) {
        let lock = acquisition.lock();
        match acquisition {
            Acquisition::Acquired(_) => {
                info!(resource = %lock.resource, holder = %holder, expires_at = %lock.expires_at, "lock acquired");
                self.record(
                    Event::new(EventAction::Acquire, holder)
                        .with_resource(&lock.resource)
                        .with_details(json!({ "expires_at": lock.expires_at })),
                );
            }
            Acquisition::Reclaimed { previous, .. } => {
                let reason = if previous.is_expired_at(lock.acquired_at) {
                    "expired"
                } else {
                    "holder_dead"
                };
                info!(
                    resource = %lock.resource,
                    holder = %holder,
                    previous_holder = %previous.holder,
                    reason,
                    "stale lock reclaimed"
                );
                self.record(
                    Event::new(EventAction::Reclaim, holder)
                        .with_resource(&lock.resource)
                        .with_details(json!({
                            "previous_holder": previous.holder,
                            "previous_expires_at": previous.expires_at,
                            "reason": reason,
                            "expires_at": lock.expires_at,
                        })),
                );
            }
            Acquisition::AlreadyHeld(_) => {
                debug!(resource = %lock.resource, holder = %holder, "lock already held by caller");
            }
        }
    }

    /// Release `resource` if `holder` owns it.
    ///
    /// Returns whether an entry was removed. Releasing a lock held by someone
    /// else (including one reclaimed from this holder) is a no-op.
    pub fn release(&self, resource: &ResourceKey, holder: &HolderId) -> Result<bool> {
        let snapshot = self.store.read()?;

        match snapshot.table.find(resource) {
            Some(current) if current.holder == *holder => {}
            Some(current) => {
                debug!(resource = %resource, holder = %holder, owner = %current.holder, "release skipped: not the holder");
                return Ok(false);
            }
            None => {
                debug!(resource = %resource, holder = %holder, "release skipped: not locked");
                return Ok(false);
            }
        }

        let mut table = snapshot.table;
        table.remove(resource);
        self.store.write(&table)?;

        info!(resource = %resource, holder = %holder, "lock released");
        self.record(Event::new(EventAction::Release, holder).with_resource(resource));
        Ok(true)
    }

    /// The current entry for `resource`, expired or not.
    pub fn current(&self, resource: &ResourceKey) -> Result<Option<Lock>> {
        Ok(self.store.read()?.table.find(resource).cloned())
    }

    /// Every lock with its expiry and holder liveness, sorted by resource.
    pub fn list(&self) -> Result<Vec<LockStatus>> {
        let snapshot = self.store.read()?;
        let now = Utc::now();

        let mut statuses: Vec<LockStatus> = snapshot
            .table
            .locks
            .into_iter()
            .map(|lock| LockStatus {
                expired: lock.is_expired_at(now),
                holder_alive: self.oracle.is_alive(&lock.holder),
                lock,
            })
            .collect();
        statuses.sort_by(|a, b| a.lock.resource.cmp(&b.lock.resource));

        Ok(statuses)
    }

    /// Remove every expired or dead-holder lock in one atomic rewrite.
    ///
    /// A malformed store is rewritten as a valid one even if nothing is
    /// removed. Returns the removed locks.
    pub fn sweep(&self, actor: &HolderId) -> Result<Vec<Lock>> {
        let snapshot = self.store.read()?;
        let now = Utc::now();

        let (stale, live): (Vec<Lock>, Vec<Lock>) = snapshot
            .table
            .locks
            .into_iter()
            .partition(|lock| lock.is_expired_at(now) || !self.oracle.is_alive(&lock.holder));

        if stale.is_empty() && snapshot.malformed.is_none() {
            return Ok(stale);
        }

        self.store.write(&LockTable { locks: live })?;

        for lock in &stale {
            info!(resource = %lock.resource, holder = %lock.holder, "stale lock swept");
        }
        self.record(Event::new(EventAction::Sweep, actor).with_details(json!({
            "removed": stale,
            "repaired_malformed_store": snapshot.malformed.is_some(),
        })));

        Ok(stale)
    }

    /// Remove the lock on `resource` regardless of who holds it.
    pub fn force_clear(&self, resource: &ResourceKey, actor: &HolderId) -> Result<Option<Lock>> {
        let snapshot = self.store.read()?;
        let mut table = snapshot.table;

        let Some(removed) = table.remove(resource) else {
            return Ok(None);
        };
        self.store.write(&table)?;

        info!(resource = %resource, previous_holder = %removed.holder, "lock force-cleared");
        self.record(
            Event::new(EventAction::Clear, actor)
                .with_resource(resource)
                .with_details(json!({ "previous": removed })),
        );
        Ok(Some(removed))
    }

    pub(crate) fn record(&self, event: Event) {
        if let Some(events) = &self.events {
            events.record(&event);
        }
    }
}
