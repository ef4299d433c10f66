use std::path::PathBuf;
use std::time::Duration;

use crate::model::{DAY_MS, Ms};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON snapshot read by the report binary.
    pub snapshot_path: PathBuf,
    /// Length of the window used when a caller asks "who is free now".
    pub default_window_ms: Ms,
    pub cache_ttl: Duration,
    pub upcoming_limit: usize,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./snapshot.json"),
            default_window_ms: DAY_MS,
            cache_ttl: Duration::from_millis(30_000),
            upcoming_limit: 5,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `FLEETAVAIL_*` variables; unset or unparsable values keep defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<i64>().ok());

        Self {
            snapshot_path: lookup("FLEETAVAIL_SNAPSHOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            default_window_ms: parsed("FLEETAVAIL_DEFAULT_WINDOW_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.default_window_ms),
            cache_ttl: parsed("FLEETAVAIL_CACHE_TTL_MS")
                .filter(|ms| *ms >= 0)
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(defaults.cache_ttl),
            upcoming_limit: parsed("FLEETAVAIL_UPCOMING_LIMIT")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.upcoming_limit),
            metrics_port: lookup("FLEETAVAIL_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
        }
    }
}
