//! Loader configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};

/// Upper bound for the derived default worker count. Thumbnail loads are
/// mostly file I/O, so more threads than this just contend on the disk.
const DEFAULT_MAX_WORKERS: usize = 4;

/// Hard ceiling for an explicitly configured worker count.
const MAX_WORKERS: usize = 64;

/// Env var overriding the worker count.
const WORKERS_ENV: &str = "THUMBLOAD_WORKERS";

/// Env var enabling per-request timing logs.
const TIMING_ENV: &str = "THUMBLOAD_TIMING";

/// Configuration for [`ImageLoader`](crate::ImageLoader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of worker threads. `None` derives it from available parallelism.
    pub worker_count: Option<usize>,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
    /// Log decode durations for every request.
    pub timing: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            thread_name_prefix: "thumbload-worker".into(),
            timing: false,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1" || v == "true")
}

impl LoaderConfig {
    /// Default configuration with env overrides applied.
    ///
    /// Unparseable `THUMBLOAD_WORKERS` values are ignored.
    pub fn from_env() -> Self {
        let worker_count = std::env::var(WORKERS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok());
        Self {
            worker_count,
            timing: env_flag(TIMING_ENV),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> LoaderResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }

    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    pub fn validate(&self) -> LoaderResult<()> {
        if self.worker_count == Some(0) {
            return Err(LoaderError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(LoaderError::InvalidConfig(
                "thread_name_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Number of workers the pool will actually start.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, MAX_WORKERS),
            None => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1)
                .clamp(1, DEFAULT_MAX_WORKERS),
        }
    }
}
