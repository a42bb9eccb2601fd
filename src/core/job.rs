//! Job body abstraction and the safety yield wrapper.

use std::future::Future;

use async_trait::async_trait;

use super::AppResult;

/// A unit of work a child runs once per lifetime.
///
/// The pool does not interpret the outcome beyond logging it: an `Err` is
/// counted as a failed child and the registry entry is still removed.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_child_pool::core::{AppResult, Job};
///
/// #[derive(Clone)]
/// struct DrainQueue;
///
/// #[async_trait]
/// impl Job for DrainQueue {
///     async fn run(&self) -> AppResult<()> {
///         // pop one item and process it
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + Clone + 'static {
    /// Execute the job body.
    async fn run(&self) -> AppResult<()>;
}

/// Adapter turning an async closure into a [`Job`].
#[derive(Clone)]
pub struct FnJob<F> {
    f: F,
}

/// Build a [`Job`] from a closure returning a future.
pub fn job_fn<F, Fut>(f: F) -> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    FnJob { f }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    async fn run(&self) -> AppResult<()> {
        (self.f)().await
    }
}

/// A job that hands control back to the scheduler once before running.
///
/// A job body that never awaits would otherwise keep every other task,
/// including the signal listener, from running on a current-thread runtime.
#[derive(Clone)]
pub struct SafeWrapped<J> {
    inner: J,
}

impl<J> SafeWrapped<J> {
    /// Borrow the wrapped job.
    pub const fn inner(&self) -> &J {
        &self.inner
    }
}

/// Wrap `job` so it yields to the scheduler at least once before running.
///
/// Errors from the wrapped job are returned unchanged.
pub fn safe_wrap<J: Job>(job: J) -> SafeWrapped<J> {
    SafeWrapped { inner: job }
}

#[async_trait]
impl<J: Job> Job for SafeWrapped<J> {
    async fn run(&self) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.inner.run().await
    }
}
