//! Worker pool manager: spawn, prune idle, drain, and force-kill children.
//!
//! A child moves through `Starting -> Idle -> Busy -> Finished`:
//!
//! 1. **Starting**: a random pre-work delay; idle termination skips it.
//! 2. **Idle**: the idle window; the only state idle termination kills.
//!    A child leaving it after [`close`](WorkerPoolManager::close) stands
//!    down instead of starting its job.
//! 3. **Busy**: the job body, run through [`safe_wrap`]; only
//!    [`kill_children`](WorkerPoolManager::kill_children) interrupts it.
//! 4. **Finished**: the completion guard removed the registry entry.
//!
//! Shutdown is composed by the caller: [`wait_for_children`] drains
//! gracefully and returns [`PoolError::Interrupted`] if another interrupt
//! arrives, after which [`kill_children`] tears everything down.
//!
//! [`wait_for_children`]: WorkerPoolManager::wait_for_children
//! [`kill_children`]: WorkerPoolManager::kill_children

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ChildPoolConfig;
use crate::runtime::signals;

use super::{
    current_child, safe_wrap, ChildId, ChildState, Interrupts, Job, PoolError, PoolStats,
    SafeWrapped, TaskRegistry,
};

/// Diagnostic identity returned by [`WorkerPoolManager::get_ident`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Ident {
    /// Called from inside a child.
    Child(ChildId),
    /// Called from outside any child; the manager's own id.
    Manager(Uuid),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child(id) => write!(f, "child:{id}"),
            Self::Manager(id) => write!(f, "manager:{id}"),
        }
    }
}

/// Owns a [`TaskRegistry`] and runs one job per spawned child.
pub struct WorkerPoolManager<J: Job> {
    config: ChildPoolConfig,
    job: SafeWrapped<J>,
    registry: Arc<TaskRegistry>,
    interrupts: Interrupts,
    ident: Uuid,
    signal_listener: Mutex<Option<JoinHandle<()>>>,
}

impl<J: Job> fmt::Debug for WorkerPoolManager<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolManager")
            .field("ident", &self.ident)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<J: Job> WorkerPoolManager<J> {
    /// Create a manager with its own interrupt counter.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ChildPoolConfig, job: J) -> Result<Self, PoolError> {
        Self::with_interrupts(config, job, Interrupts::new())
    }

    /// Create a manager observing an existing interrupt counter.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the configuration is invalid.
    pub fn with_interrupts(
        config: ChildPoolConfig,
        job: J,
        interrupts: Interrupts,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let ident = Uuid::new_v4();
        info!(
            manager = %ident,
            max_children = config.max_children,
            idle_window_ms = config.idle_window_ms,
            "child pool initialized"
        );

        Ok(Self {
            registry: Arc::new(TaskRegistry::new(config.max_children)),
            config,
            job: safe_wrap(job),
            interrupts,
            ident,
            signal_listener: Mutex::new(None),
        })
    }

    /// Spawn one child, waiting for a free slot if the pool is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolClosed`] after [`close`](Self::close).
    pub async fn spawn_child(&self) -> Result<ChildId, PoolError> {
        let job = self.job.clone();
        let pre_work = self.config.sample_pre_work_delay();
        let idle_window = self.config.idle_window();
        let registry = Arc::clone(&self.registry);

        self.registry
            .spawn(move |id, event| async move {
                tokio::time::sleep(pre_work).await;

                if !event.set() {
                    return Ok(());
                }
                if idle_window.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(idle_window).await;
                }

                // No new work once shutdown has begun.
                if registry.is_closed() && event.claim_idle() {
                    debug!(child_id = %id, "pool closed, child stands down before its job");
                    return Ok(());
                }
                // Claimed for termination during the idle window.
                if !event.clear() {
                    debug!(child_id = %id, "child claimed before starting its job");
                    return Ok(());
                }
                job.run().await
            })
            .await
    }

    /// Request a kill for every child that reports idle and leave busy ones
    /// alone. Returns without waiting for the kills to land.
    pub fn terminate_idle_children(&self) -> Vec<ChildId> {
        info!(live = self.registry.len(), "terminating idle children");
        let killed = self.registry.terminate_idle();
        info!(killed = killed.len(), "idle termination requested");
        killed
    }

    /// Wait until every registered child has finished on its own.
    ///
    /// Returns immediately if no child is registered.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Interrupted`] if an interrupt is raised while
    /// waiting. Children keep running.
    pub async fn wait_for_children(&self) -> Result<(), PoolError> {
        self.wait_for_children_since(self.interrupts.count()).await
    }

    /// Like [`wait_for_children`](Self::wait_for_children), but interrupted
    /// by any interrupt beyond the first `seen`, including ones raised before
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Interrupted`] if the interrupt count is, or
    /// becomes, greater than `seen` while children are still registered.
    pub async fn wait_for_children_since(&self, seen: u64) -> Result<(), PoolError> {
        info!(
            live = self.registry.len(),
            seen,
            "waiting for children to finish gracefully"
        );

        tokio::select! {
            biased;
            () = self.registry.wait_empty() => {
                info!("all children finished");
                Ok(())
            }
            () = self.interrupts.raised_since(seen) => {
                info!(live = self.registry.len(), "graceful drain interrupted");
                Err(PoolError::Interrupted)
            }
        }
    }

    /// Kill every registered child, busy or not, and wait until all are gone.
    ///
    /// Returns how many children a kill was requested for.
    pub async fn kill_children(&self) -> usize {
        info!(live = self.registry.len(), "killing all children");
        let requested = self.registry.kill_all();
        self.registry.wait_empty().await;
        info!(killed = requested, "all children killed");
        requested
    }

    /// Remove a child's registry entry.
    ///
    /// The completion guard calls this automatically; calling it for a child
    /// that already finished reports the duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DoubleUnregister`] if `id` is not registered.
    pub fn unregister_child(&self, id: ChildId) -> Result<(), PoolError> {
        self.registry.unregister(id)
    }

    /// Forward SIGTERM/SIGINT to this manager's interrupt counter.
    ///
    /// Replaces any listener installed earlier. Must be called inside a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Signal`] if a listener cannot be registered.
    pub fn install_signal_handlers(&self) -> Result<(), PoolError> {
        let handle = signals::listen(self.interrupts.clone())?;
        if let Some(previous) = self.signal_listener.lock().replace(handle) {
            previous.abort();
        }
        info!(manager = %self.ident, "signal handlers installed");
        Ok(())
    }

    /// Identity of the caller: the current child if called from inside one,
    /// otherwise the manager.
    #[must_use]
    pub fn get_ident(&self) -> Ident {
        current_child().map_or(Ident::Manager(self.ident), Ident::Child)
    }

    /// Interrupt counter this manager observes.
    #[must_use]
    pub fn interrupts(&self) -> &Interrupts {
        &self.interrupts
    }

    /// Stop accepting new children.
    ///
    /// Busy children are unaffected. Children that have not started their
    /// job yet stand down when they reach it and are counted as killed.
    pub fn close(&self) {
        info!(manager = %self.ident, "child pool closed");
        self.registry.close();
    }

    /// Maximum number of concurrent children.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.max_children
    }

    /// Number of registered children.
    #[must_use]
    pub fn live_children(&self) -> usize {
        self.registry.len()
    }

    /// Snapshot of every registered child and its state.
    #[must_use]
    pub fn children(&self) -> Vec<(ChildId, ChildState)> {
        self.registry.children()
    }

    /// Underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Occupancy and lifetime counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.registry.stats()
    }

    /// Configuration the manager was built with.
    #[must_use]
    pub const fn config(&self) -> &ChildPoolConfig {
        &self.config
    }
}

impl<J: Job> Drop for WorkerPoolManager<J> {
    fn drop(&mut self) {
        if let Some(listener) = self.signal_listener.get_mut().take() {
            listener.abort();
        }
        if !self.registry.is_empty() {
            debug!(
                live = self.registry.len(),
                "manager dropped with live children, they keep running detached"
            );
        }
    }
}
