//! Tests for configuration validation and loading

use prometheus_child_pool::config::{ChildPoolConfig, MAX_CHILDREN_LIMIT};

#[test]
fn test_default_config_is_valid() {
    let cfg = ChildPoolConfig::default();
    assert_eq!(cfg.max_children, 40);
    assert_eq!(cfg.pre_work_delay_max_ms, 10_000);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_zero_children_is_invalid() {
    let cfg = ChildPoolConfig::new().with_max_children(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_too_many_children_is_invalid() {
    let cfg = ChildPoolConfig::new().with_max_children(MAX_CHILDREN_LIMIT + 1);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_inverted_delay_range_is_invalid() {
    let cfg = ChildPoolConfig::new().with_pre_work_delay_ms(500, 100);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_fills_defaults() {
    let json = r#"{ "max_children": 8, "idle_window_ms": 250 }"#;

    let cfg = ChildPoolConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.max_children, 8);
    assert_eq!(cfg.idle_window_ms, 250);
    assert_eq!(cfg.pre_work_delay_min_ms, 0);
    assert_eq!(cfg.pre_work_delay_max_ms, 10_000);
}

#[test]
fn test_from_json_rejects_invalid_values() {
    let err = ChildPoolConfig::from_json_str(r#"{ "max_children": 0 }"#).unwrap_err();
    assert!(err.contains("max_children"));

    let err = ChildPoolConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_from_env_reads_overrides() {
    std::env::set_var("CHILD_POOL_MAX_CHILDREN", "7");
    std::env::set_var("CHILD_POOL_PRE_WORK_DELAY_MIN_MS", "5");
    std::env::set_var("CHILD_POOL_PRE_WORK_DELAY_MAX_MS", "15");
    std::env::set_var("CHILD_POOL_IDLE_WINDOW_MS", "100");

    let cfg = ChildPoolConfig::from_env().unwrap();

    std::env::remove_var("CHILD_POOL_MAX_CHILDREN");
    std::env::remove_var("CHILD_POOL_PRE_WORK_DELAY_MIN_MS");
    std::env::remove_var("CHILD_POOL_PRE_WORK_DELAY_MAX_MS");
    std::env::remove_var("CHILD_POOL_IDLE_WINDOW_MS");

    assert_eq!(
        cfg,
        ChildPoolConfig::new()
            .with_max_children(7)
            .with_pre_work_delay_ms(5, 15)
            .with_idle_window_ms(100)
    );
}
