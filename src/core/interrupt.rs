//! Interrupt counter observed by blocking pool operations.

use std::sync::Arc;

use tokio::sync::watch;

/// Monotonic interrupt counter shared by the signal listener, the driver and
/// the pool.
///
/// Waiters record [`count`](Self::count) when they start and resolve
/// [`raised_since`](Self::raised_since) once a later interrupt arrives, so a
/// second Ctrl+C during a drain is seen even though the first was already
/// handled.
#[derive(Debug, Clone)]
pub struct Interrupts {
    generation: Arc<watch::Sender<u64>>,
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupts {
    /// Create a counter with no interrupts raised.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            generation: Arc::new(tx),
        }
    }

    /// Raise one interrupt and wake every waiter.
    pub fn raise(&self) {
        self.generation.send_modify(|n| *n += 1);
    }

    /// Interrupts raised so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Resolve once the counter moves past `seen`.
    pub async fn raised_since(&self, seen: u64) {
        let mut rx = self.generation.subscribe();
        let _ = rx.wait_for(|n| *n > seen).await;
    }
}
