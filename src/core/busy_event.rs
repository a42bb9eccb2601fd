//! Per-child busy/idle signal.
//!
//! A [`BusyEvent`] records where a child is in its lifecycle:
//!
//! ```text
//! Starting ──set()──▶ Idle ──clear()──▶ Busy ──finish()──▶ Finished
//!                      │
//!                      └──claim_idle()──▶ Killing ──finish()──▶ Finished
//! ```
//!
//! Only `Idle` is kill-eligible. The `Idle → Busy` and `Idle → Killing`
//! transitions are both compare-and-set under the channel lock, so a child
//! that has been claimed for termination can no longer enter its job and a
//! child that has entered its job can no longer be claimed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle state of a managed child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildState {
    /// Spawned and doing pre-work; not kill-eligible.
    Starting,
    /// Inside its idle window; may be killed by idle termination.
    Idle,
    /// Executing its job body; only a forced kill may interrupt it.
    Busy,
    /// A kill has been requested and the child is being torn down.
    Killing,
    /// Completion observed; the registry entry is gone or going.
    Finished,
}

impl ChildState {
    /// Whether the child is still holding a pool slot.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Finished)
    }
}

/// Binary busy/idle flag shared between a child and its pool.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct BusyEvent {
    state: Arc<watch::Sender<ChildState>>,
}

impl Default for BusyEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyEvent {
    /// Create a new event in the `Starting` (cleared) state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ChildState::Starting);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Mark the child idle and available for termination.
    ///
    /// Returns `false` if a kill was already requested or the child finished.
    pub fn set(&self) -> bool {
        self.state.send_if_modified(|state| match *state {
            ChildState::Starting | ChildState::Busy => {
                *state = ChildState::Idle;
                true
            }
            _ => false,
        })
    }

    /// Mark the child busy so idle termination leaves it alone.
    ///
    /// Returns `false` if the child was claimed for termination (or already
    /// finished); the caller must then not start job work.
    pub fn clear(&self) -> bool {
        let mut busy = false;
        self.state.send_if_modified(|state| match *state {
            ChildState::Starting | ChildState::Idle => {
                *state = ChildState::Busy;
                busy = true;
                true
            }
            ChildState::Busy => {
                busy = true;
                false
            }
            ChildState::Killing | ChildState::Finished => false,
        });
        busy
    }

    /// Whether the child currently reports idle.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self.state.borrow() == ChildState::Idle
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> ChildState {
        *self.state.borrow()
    }

    /// Atomically move an idle child to `Killing`.
    ///
    /// Returns `true` only if the child was idle at the moment of the claim.
    pub fn claim_idle(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ChildState::Idle {
                *state = ChildState::Killing;
                true
            } else {
                false
            }
        })
    }

    /// Move any live child to `Killing`, regardless of busy state.
    ///
    /// Returns the state the child was in before the request.
    pub fn force_kill(&self) -> ChildState {
        let mut previous = ChildState::Finished;
        self.state.send_if_modified(|state| {
            previous = *state;
            if state.is_live() && *state != ChildState::Killing {
                *state = ChildState::Killing;
                true
            } else {
                false
            }
        });
        previous
    }

    /// Terminal transition performed by the completion path.
    pub fn finish(&self) {
        self.state.send_replace(ChildState::Finished);
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChildState> {
        self.state.subscribe()
    }

    /// Wait until the state satisfies `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> ChildState
    where
        F: FnMut(ChildState) -> bool,
    {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        // Bound to a local so the `watch::Ref` is released before `rx` drops.
        let state = match rx.wait_for(|state| predicate(*state)).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}
