//! Child pool configuration.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on `max_children`, well below the semaphore permit limit.
pub const MAX_CHILDREN_LIMIT: usize = 1 << 20;

/// Configuration for a [`WorkerPoolManager`](crate::core::WorkerPoolManager).
///
/// Each child sleeps for a random pre-work delay drawn from
/// `pre_work_delay_min_ms..=pre_work_delay_max_ms` (not kill-eligible), then
/// stays idle for `idle_window_ms` (kill-eligible) before running its job.
/// An idle window of zero still gives idle termination one scheduling turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildPoolConfig {
    /// Maximum number of concurrently running children.
    pub max_children: usize,
    /// Lower bound of the pre-work delay in milliseconds.
    pub pre_work_delay_min_ms: u64,
    /// Upper bound of the pre-work delay in milliseconds.
    pub pre_work_delay_max_ms: u64,
    /// Length of the idle window in milliseconds.
    pub idle_window_ms: u64,
}

impl Default for ChildPoolConfig {
    fn default() -> Self {
        Self {
            max_children: 40,
            pre_work_delay_min_ms: 0,
            pre_work_delay_max_ms: 10_000,
            idle_window_ms: 0,
        }
    }
}

impl ChildPoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool capacity.
    #[must_use]
    pub const fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }

    /// Set the pre-work delay range in milliseconds (inclusive).
    #[must_use]
    pub const fn with_pre_work_delay_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.pre_work_delay_min_ms = min_ms;
        self.pre_work_delay_max_ms = max_ms;
        self
    }

    /// Set the idle window in milliseconds.
    #[must_use]
    pub const fn with_idle_window_ms(mut self, idle_window_ms: u64) -> Self {
        self.idle_window_ms = idle_window_ms;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_children == 0 {
            return Err("max_children must be greater than 0".into());
        }
        if self.max_children > MAX_CHILDREN_LIMIT {
            return Err(format!("max_children must be at most {MAX_CHILDREN_LIMIT}"));
        }
        if self.pre_work_delay_min_ms > self.pre_work_delay_max_ms {
            return Err("pre_work_delay_min_ms must not exceed pre_work_delay_max_ms".into());
        }
        Ok(())
    }

    /// Draw a pre-work delay for one child.
    #[must_use]
    pub fn sample_pre_work_delay(&self) -> Duration {
        let ms = if self.pre_work_delay_min_ms >= self.pre_work_delay_max_ms {
            self.pre_work_delay_min_ms
        } else {
            rand::rng().random_range(self.pre_work_delay_min_ms..=self.pre_work_delay_max_ms)
        };
        Duration::from_millis(ms)
    }

    /// Idle window as a duration.
    #[must_use]
    pub const fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `CHILD_POOL_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Recognised variables: `CHILD_POOL_MAX_CHILDREN`,
    /// `CHILD_POOL_PRE_WORK_DELAY_MIN_MS`, `CHILD_POOL_PRE_WORK_DELAY_MAX_MS`,
    /// `CHILD_POOL_IDLE_WINDOW_MS`. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_var("CHILD_POOL_MAX_CHILDREN")? {
            cfg.max_children = v;
        }
        if let Some(v) = env_var("CHILD_POOL_PRE_WORK_DELAY_MIN_MS")? {
            cfg.pre_work_delay_min_ms = v;
        }
        if let Some(v) = env_var("CHILD_POOL_PRE_WORK_DELAY_MAX_MS")? {
            cfg.pre_work_delay_max_ms = v;
        }
        if let Some(v) = env_var("CHILD_POOL_IDLE_WINDOW_MS")? {
            cfg.idle_window_ms = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("{name}: {e}")),
    }
}
