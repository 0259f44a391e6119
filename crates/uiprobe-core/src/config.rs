//! Session timing configuration.
//!
//! Defaults can be overridden per process through environment variables:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `UIPROBE_CACHE_TTL_MS` | `cache_ttl` | 1000 |
//! | `UIPROBE_TIMEOUT_MS` | `default_timeout` | 10000 |
//! | `UIPROBE_POLL_MS` | `poll_interval` | 100 |
//! | `UIPROBE_REFRESH_MS` | `refresh_interval` | 500 |
//!
//! Empty or unparseable values are ignored with a warning.

use std::env;
use std::time::Duration;

use tracing::warn;

/// How long a cached snapshot stays fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(1000);

/// How long waits run before failing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between polls of a wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often a wait bypasses the cache and forces a new capture.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub cache_ttl: Duration,
    pub default_timeout: Duration,
    pub poll_interval: Duration,
    pub refresh_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            default_timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults with overrides from an arbitrary lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let read = |name: &str, slot: &mut Duration| {
            let Some(raw) = lookup(name) else {
                return;
            };
            match raw.trim().parse::<u64>() {
                Ok(ms) => *slot = Duration::from_millis(ms),
                Err(_) if raw.trim().is_empty() => {}
                Err(_) => warn!("Ignoring {}='{}': expected milliseconds", name, raw),
            }
        };
        read("UIPROBE_CACHE_TTL_MS", &mut config.cache_ttl);
        read("UIPROBE_TIMEOUT_MS", &mut config.default_timeout);
        read("UIPROBE_POLL_MS", &mut config.poll_interval);
        read("UIPROBE_REFRESH_MS", &mut config.refresh_interval);
        config
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert!(config.refresh_interval > config.poll_interval);
    }

    #[test]
    fn test_lookup_overrides_and_ignores_bad_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("UIPROBE_CACHE_TTL_MS", "250"),
            ("UIPROBE_TIMEOUT_MS", "not-a-number"),
            ("UIPROBE_POLL_MS", ""),
            ("UIPROBE_REFRESH_MS", " 750 "),
        ]);
        let config = SessionConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.cache_ttl, Duration::from_millis(250));
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.refresh_interval, Duration::from_millis(750));
    }
}
