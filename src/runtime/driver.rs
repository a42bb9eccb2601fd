//! Reference driver loop composing the pool primitives.
//!
//! The loop keeps the pool topped up until the first interrupt, then stops
//! spawning, kills whatever is idle, and drains. A second interrupt during
//! the drain escalates to killing every child.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{Job, PoolError, WorkerPoolManager};

/// How [`run`] shut the pool down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Every child finished on its own.
    Graceful,
    /// The drain was interrupted and remaining children were killed.
    Forced,
}

/// Drive `manager` until interrupted and shut it down.
///
/// Children still in their pre-work phase at shutdown stand down without
/// running their job once the pre-work ends. Busy children finish during the
/// drain unless a second interrupt arrives, even one raised before the drain
/// began.
///
/// # Errors
///
/// Propagates pool errors other than the expected closed/interrupted ones.
pub async fn run<J: Job>(manager: &WorkerPoolManager<J>) -> Result<ShutdownMode, PoolError> {
    let interrupts = manager.interrupts();
    let started = interrupts.count();
    info!(capacity = manager.capacity(), "driver started");

    // Interrupts at or below this count belong to the shutdown request itself.
    let handled = loop {
        tokio::select! {
            biased;
            () = interrupts.raised_since(started) => break started + 1,
            spawned = manager.spawn_child() => match spawned {
                Ok(_) => {}
                Err(PoolError::PoolClosed) => break interrupts.count(),
                Err(e) => return Err(e),
            },
        }
    };

    info!(live = manager.live_children(), "shutdown requested, no new children");
    manager.close();
    manager.terminate_idle_children();

    match manager.wait_for_children_since(handled).await {
        Ok(()) => {
            info!("shutdown complete");
            Ok(ShutdownMode::Graceful)
        }
        Err(PoolError::Interrupted) => {
            warn!(live = manager.live_children(), "second interrupt, killing busy children");
            manager.kill_children().await;
            Ok(ShutdownMode::Forced)
        }
        Err(e) => Err(e),
    }
}
