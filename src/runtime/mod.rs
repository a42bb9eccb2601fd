//! Runtime glue: signal listeners and the reference driver loop.

pub mod driver;
pub mod signals;

pub use driver::{run, ShutdownMode};
