//! # Prometheus Child Pool
//!
//! A bounded pool of cooperative children for job-processing hosts.
//!
//! Each child runs one job. The pool tracks whether every child is idle or
//! busy so that shutdown can kill only the children that are not doing work,
//! drain the rest gracefully, and fall back to killing everything when the
//! drain is interrupted.
//!
//! ## Lifecycle
//!
//! ```text
//! spawn_child ──▶ Starting ──▶ Idle ──▶ Busy ──▶ Finished
//!                               │
//!                               └── terminate_idle_children ──▶ Finished
//! ```
//!
//! - **Back-pressure**: `spawn_child` waits for a free slot when the pool
//!   holds `max_children` children.
//! - **Idle termination**: `terminate_idle_children` claims idle children
//!   atomically, so a child that already started its job is never killed.
//! - **Graceful drain**: `wait_for_children` waits for the registry to empty
//!   and is interruptible by the next SIGTERM/SIGINT.
//! - **Forced shutdown**: `kill_children` kills every child, busy or not.
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_child_pool::config::ChildPoolConfig;
//! use prometheus_child_pool::core::{job_fn, PoolError, WorkerPoolManager};
//!
//! let pool = WorkerPoolManager::new(
//!     ChildPoolConfig::new().with_max_children(4),
//!     job_fn(|| async { Ok(()) }),
//! )?;
//! pool.install_signal_handlers()?;
//!
//! for _ in 0..4 {
//!     pool.spawn_child().await?;
//! }
//! pool.terminate_idle_children();
//! if let Err(PoolError::Interrupted) = pool.wait_for_children().await {
//!     pool.kill_children().await;
//! }
//! ```
//!
//! For a complete loop see [`runtime::run`] and `src/bin/child_pool.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Child lifecycle tracking, bounded spawning, and shutdown coordination.
pub mod core;
/// Configuration models for the child pool.
pub mod config;
/// Signal listeners and the reference driver loop.
pub mod runtime;
/// Shared utilities.
pub mod util;
