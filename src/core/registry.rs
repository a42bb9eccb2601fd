//! Bounded registry of live children and their busy events.
//!
//! The registry owns three things:
//!
//! - a `tokio::sync::Semaphore` with one permit per pool slot, which is the
//!   back-pressure mechanism for `spawn`;
//! - a `parking_lot::Mutex<HashMap<ChildId, ChildEntry>>` mapping each live
//!   child to its [`BusyEvent`] and abort handle;
//! - a `watch` channel carrying the live count so drains can be awaited.
//!
//! Every spawned child carries a completion guard inside its future. The
//! guard is dropped exactly once on any terminal outcome (return, error,
//! panic, abort, or the future being dropped unpolled) and removes the
//! registry entry before the slot permit is released.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{AppResult, BusyEvent, ChildState, PoolError};

tokio::task_local! {
    static CURRENT_CHILD: ChildId;
}

/// Identity of a spawned child, stable for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(Uuid);

impl ChildId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChildId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Id of the child whose future is currently being polled, if any.
#[must_use]
pub fn current_child() -> Option<ChildId> {
    CURRENT_CHILD.try_with(|id| *id).ok()
}

/// Point-in-time view of pool occupancy and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Maximum number of concurrent children.
    pub capacity: usize,
    /// Children currently registered.
    pub live: usize,
    /// Registered children reporting idle.
    pub idle: usize,
    /// Registered children executing their job.
    pub busy: usize,
    /// Children spawned since construction.
    pub spawned: u64,
    /// Children whose job returned `Ok`.
    pub completed: u64,
    /// Children whose job returned `Err`.
    pub failed: u64,
    /// Children torn down by a kill request.
    pub killed: u64,
    /// Children whose job panicked.
    pub panicked: u64,
}

/// How a child left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildExit {
    Completed,
    Failed,
    Killed,
    Panicked,
}

#[derive(Debug, Default)]
struct ChildCounters {
    spawned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    killed: AtomicU64,
    panicked: AtomicU64,
}

struct ChildEntry {
    event: BusyEvent,
    /// `None` only between registration and `tokio::spawn` returning.
    abort: Option<AbortHandle>,
}

/// Mapping from live child to busy event, capped at a fixed capacity.
pub struct TaskRegistry {
    capacity: usize,
    slots: Arc<Semaphore>,
    entries: Mutex<HashMap<ChildId, ChildEntry>>,
    live: watch::Sender<usize>,
    counters: ChildCounters,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("capacity", &self.capacity)
            .field("live", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl TaskRegistry {
    /// Create a registry with room for `capacity` concurrent children.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (live, _rx) = watch::channel(0);
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            live,
            counters: ChildCounters::default(),
        }
    }

    /// Maximum number of concurrent children.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no child is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Slots that a spawn could take right now without waiting.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stop handing out slots. Pending and future spawns fail with
    /// [`PoolError::PoolClosed`]; live children are unaffected.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Spawn a child running `body`.
    ///
    /// Waits for a free slot first. `body` receives the child's id and its
    /// busy event and builds the future the child runs. The registry entry
    /// exists before the child is first polled and is removed when the child
    /// terminates, however it terminates.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolClosed`] if the registry was closed.
    pub async fn spawn<B, F>(self: &Arc<Self>, body: B) -> Result<ChildId, PoolError>
    where
        B: FnOnce(ChildId, BusyEvent) -> F,
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::PoolClosed)?;

        let id = ChildId::new();
        let event = BusyEvent::new();
        self.register(id, event.clone());
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);

        let mut guard = CompletionGuard {
            registry: Arc::clone(self),
            id,
            event: event.clone(),
            exit: None,
            _permit: permit,
        };
        let work = body(id, event);

        let handle = tokio::spawn(CURRENT_CHILD.scope(id, async move {
            guard.exit = Some(match AssertUnwindSafe(work).catch_unwind().await {
                // The body returned early because a kill was already requested.
                Ok(Ok(())) if guard.event.state() == ChildState::Killing => ChildExit::Killed,
                Ok(Ok(())) => ChildExit::Completed,
                Ok(Err(e)) => {
                    warn!(child_id = %guard.id, error = %e, "child job failed");
                    ChildExit::Failed
                }
                Err(_) => {
                    error!(child_id = %guard.id, "child job panicked");
                    ChildExit::Panicked
                }
            });
            drop(guard);
        }));
        self.attach(id, handle.abort_handle());

        debug!(child_id = %id, live = self.len(), "child spawned");
        Ok(id)
    }

    /// Remove the entry for `id`.
    ///
    /// Called by the completion guard; a second call for the same id means
    /// the one-shot completion contract was broken.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DoubleUnregister`] if `id` is not registered.
    pub fn unregister(&self, id: ChildId) -> Result<(), PoolError> {
        let removed = {
            let mut entries = self.entries.lock();
            let removed = entries.remove(&id);
            self.live.send_replace(entries.len());
            removed
        };

        if removed.is_some() {
            debug!(child_id = %id, "child unregistered");
            Ok(())
        } else {
            error!(child_id = %id, "child unregistered twice, completion fired more than once");
            Err(PoolError::DoubleUnregister(id))
        }
    }

    /// Request a kill for every child currently reporting idle.
    ///
    /// Each idle child is claimed (`Idle -> Killing`) before its abort is
    /// requested, so a child that has already entered its job is skipped.
    /// Returns the ids a kill was requested for; the kills complete
    /// asynchronously at each child's next await point.
    pub fn terminate_idle(&self) -> Vec<ChildId> {
        let entries = self.entries.lock();
        let mut killed = Vec::new();
        for (id, entry) in entries.iter() {
            if entry.event.claim_idle() {
                info!(child_id = %id, "killing idle child");
                // Abort only schedules cancellation; the guard runs later on
                // the runtime, never inside this lock.
                if let Some(abort) = &entry.abort {
                    abort.abort();
                }
                killed.push(*id);
            } else {
                match entry.event.state() {
                    ChildState::Busy => debug!(child_id = %id, "child still busy, leaving it"),
                    state => debug!(child_id = %id, state = ?state, "child not idle, leaving it"),
                }
            }
        }
        killed
    }

    /// Request a kill for every registered child, busy or not.
    ///
    /// Returns how many live children a kill was requested for.
    pub fn kill_all(&self) -> usize {
        let entries = self.entries.lock();
        let mut requested = 0;
        for (id, entry) in entries.iter() {
            let previous = entry.event.force_kill();
            if previous.is_live() {
                info!(child_id = %id, previous = ?previous, "killing child");
                if let Some(abort) = &entry.abort {
                    abort.abort();
                }
                requested += 1;
            }
        }
        requested
    }

    /// Resolve once no child is registered. Returns immediately if empty.
    pub async fn wait_empty(&self) {
        let mut rx = self.live.subscribe();
        // The sender is owned by `self`, so the channel stays open.
        let _ = rx.wait_for(|live| *live == 0).await;
    }

    /// Busy event of a registered child.
    #[must_use]
    pub fn event(&self, id: ChildId) -> Option<BusyEvent> {
        self.entries.lock().get(&id).map(|entry| entry.event.clone())
    }

    /// Snapshot of every registered child and its state.
    #[must_use]
    pub fn children(&self) -> Vec<(ChildId, ChildState)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (*id, entry.event.state()))
            .collect()
    }

    /// Occupancy and lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (live, idle, busy) = {
            let entries = self.entries.lock();
            let mut idle = 0;
            let mut busy = 0;
            for entry in entries.values() {
                match entry.event.state() {
                    ChildState::Idle => idle += 1,
                    ChildState::Busy => busy += 1,
                    _ => {}
                }
            }
            (entries.len(), idle, busy)
        };
        PoolStats {
            capacity: self.capacity,
            live,
            idle,
            busy,
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            killed: self.counters.killed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    fn register(&self, id: ChildId, event: BusyEvent) {
        let mut entries = self.entries.lock();
        entries.insert(id, ChildEntry { event, abort: None });
        self.live.send_replace(entries.len());
    }

    fn attach(&self, id: ChildId, abort: AbortHandle) {
        let mut entries = self.entries.lock();
        // The child may already be gone (multi-thread runtime), or a kill may
        // have been requested before the handle existed.
        if let Some(entry) = entries.get_mut(&id) {
            if entry.event.state() == ChildState::Killing {
                abort.abort();
            }
            entry.abort = Some(abort);
        }
    }

    fn record_exit(&self, id: ChildId, exit: ChildExit) {
        let counter = match exit {
            ChildExit::Completed => &self.counters.completed,
            ChildExit::Failed => &self.counters.failed,
            ChildExit::Killed => &self.counters.killed,
            ChildExit::Panicked => &self.counters.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        debug!(child_id = %id, exit = ?exit, "child finished");
    }
}

/// Completion continuation carried inside every child future.
struct CompletionGuard {
    registry: Arc<TaskRegistry>,
    id: ChildId,
    event: BusyEvent,
    exit: Option<ChildExit>,
    /// Released after `drop` runs, i.e. after the entry is gone.
    _permit: OwnedSemaphorePermit,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // No recorded exit means the future was dropped before finishing.
        let exit = self.exit.unwrap_or(ChildExit::Killed);

        if self.registry.unregister(self.id).is_ok() {
            self.registry.record_exit(self.id, exit);
        }
        self.event.finish();
    }
}
