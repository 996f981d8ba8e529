//! Cache configuration.
//!
//! Sizes and expiry for the lookup caches, resolved from the `[cache]`
//! section of the settings file.

use std::time::Duration;

// Default values for cache configuration
const DEFAULT_CAPACITY: usize = 5;
const DEFAULT_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_PURGE_INTERVAL_SECONDS: u64 = 300;

/// Cache configuration shared by every lookup cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum resident entries per cache.
    pub capacity: usize,
    /// Lifetime of an entry after its last write, in seconds.
    pub ttl_seconds: u64,
    /// Interval of the background expiry sweep; `0` disables it.
    pub purge_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            purge_interval_seconds: DEFAULT_PURGE_INTERVAL_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.capacity.get(),
            ttl_seconds: settings.ttl.as_secs(),
            purge_interval_seconds: settings
                .purge_interval
                .map(|interval| interval.as_secs())
                .unwrap_or(0),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Returns the sweep interval, or `None` when sweeping is disabled.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_seconds > 0).then(|| Duration::from_secs(self.purge_interval_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 5);
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.purge_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn zero_interval_disables_sweep() {
        let config = CacheConfig {
            purge_interval_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.purge_interval(), None);
    }

    #[test]
    fn settings_conversion_keeps_disabled_sweep() {
        let settings = crate::config::CacheSettings {
            capacity: std::num::NonZeroUsize::MIN,
            ttl: Duration::from_secs(60),
            purge_interval: None,
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.capacity, 1);
        assert_eq!(config.ttl_seconds, 60);
        assert_eq!(config.purge_interval(), None);
    }
}
