//! Rebuild task configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// First retry delay for a failing key.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);
/// Upper bound for the exponential backoff.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);
/// Number of queue consumers.
pub const DEFAULT_WORKERS: usize = 20;

/// Backoff and worker-pool settings, read once at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildConfig {
    /// Delay before the first retry of a failing key.
    pub base_delay: Duration,
    /// Cap on the per-key retry delay.
    pub max_delay: Duration,
    /// Fixed size of the worker pool.
    pub workers: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl RebuildConfig {
    /// Read overrides from the environment. Unset, unparsable, or
    /// non-positive values fall back to the defaults.
    ///
    /// - `GANTRY_REBUILD_BASE_DELAY_MS`
    /// - `GANTRY_REBUILD_MAX_DELAY_MS`
    /// - `GANTRY_REBUILD_WORKERS`
    pub fn from_env() -> Self {
        Self {
            base_delay: duration_ms_from_env("GANTRY_REBUILD_BASE_DELAY_MS", DEFAULT_BASE_DELAY),
            max_delay: duration_ms_from_env("GANTRY_REBUILD_MAX_DELAY_MS", DEFAULT_MAX_DELAY),
            workers: match std::env::var("GANTRY_REBUILD_WORKERS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
            {
                Some(n) if n > 0 => n as usize,
                _ => DEFAULT_WORKERS,
            },
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

fn duration_ms_from_env(key: &str, default: Duration) -> Duration {
    match std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok()) {
        Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
        _ => default,
    }
}
