//! Error types for child pool operations.

use thiserror::Error;

use super::ChildId;

/// Errors produced by the child pool.
///
/// Job failures are not represented here: a job body returns [`AppResult`]
/// and its error is logged and counted by the child's completion path.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The pool no longer accepts new children.
    #[error("child pool is closed")]
    PoolClosed,
    /// An interrupt was raised while waiting for children to drain.
    #[error("interrupted while waiting for children")]
    Interrupted,
    /// A registry entry was removed twice; the runtime broke its contract.
    #[error("child {0} was already unregistered")]
    DoubleUnregister(ChildId),
    /// Installing the termination signal listeners failed.
    #[error("signal handler installation failed: {0}")]
    Signal(#[from] std::io::Error),
}

/// Application-facing result using anyhow for job bodies and entry points.
pub type AppResult<T> = Result<T, anyhow::Error>;
