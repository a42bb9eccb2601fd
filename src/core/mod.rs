//! Child lifecycle tracking, bounded spawning, and shutdown coordination.

pub mod busy_event;
pub mod error;
pub mod interrupt;
pub mod job;
pub mod manager;
pub mod registry;

pub use busy_event::{BusyEvent, ChildState};
pub use error::{AppResult, PoolError};
pub use interrupt::Interrupts;
pub use job::{job_fn, safe_wrap, FnJob, Job, SafeWrapped};
pub use manager::{Ident, WorkerPoolManager};
pub use registry::{current_child, ChildId, PoolStats, TaskRegistry};
