//! Tests for error types

use prometheus_child_pool::core::{ChildId, PoolError};

#[test]
fn test_invalid_config_error() {
    let err = PoolError::InvalidConfig("max_children must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_children must be greater than 0"
    );
}

#[test]
fn test_pool_closed_error() {
    assert_eq!(format!("{}", PoolError::PoolClosed), "child pool is closed");
}

#[test]
fn test_interrupted_error() {
    assert_eq!(
        format!("{}", PoolError::Interrupted),
        "interrupted while waiting for children"
    );
}

#[test]
fn test_double_unregister_error_names_child() {
    let id = ChildId::new();
    let err = PoolError::DoubleUnregister(id);
    assert_eq!(format!("{}", err), format!("child {id} was already unregistered"));
}

#[test]
fn test_signal_error_from_io() {
    let err: PoolError = std::io::Error::other("no signals here").into();
    assert!(matches!(err, PoolError::Signal(_)));
    assert_eq!(
        format!("{}", err),
        "signal handler installation failed: no signals here"
    );
}
