//! Configuration models for the child pool.

pub mod pool;

pub use pool::{ChildPoolConfig, MAX_CHILDREN_LIMIT};
