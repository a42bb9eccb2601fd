//! Tests for telemetry helpers

use prometheus_child_pool::util::{init_tracing, DEFAULT_FILTER};

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    assert!(!init_tracing(), "second install must be a no-op");
}

#[test]
fn test_default_filter_covers_crate() {
    assert!(DEFAULT_FILTER.contains("prometheus_child_pool"));
}
