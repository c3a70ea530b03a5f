//! Bounded in-memory caches with per-entry expiry.
//!
//! One [`TtlCache`] instance exists per resource type (geocode, reverse
//! geocode, weather, route, resolved addresses). Instances are never shared
//! between resource types; the component that owns a cache is the only writer.

mod ttl;

pub use ttl::TtlCache;

use std::fmt;
use std::time::Duration;

/// Default maximum number of entries per cache.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default time-to-live for cache entries (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Sizing and expiry settings for a single cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries held at once.
    pub max_size: usize,
    /// Age after which an entry is treated as absent.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    /// Create a config with explicit limits.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { max_size, ttl }
    }
}

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a live entry.
    pub hits: u64,
    /// Lookups that found nothing (including expired entries).
    pub misses: u64,
    /// Entries removed to make room for a new key.
    pub evictions: u64,
    /// Entries dropped lazily because their TTL had elapsed.
    pub expirations: u64,
    /// Entries currently held (live or not yet swept).
    pub entry_count: usize,
}

impl CacheStats {
    /// Fraction of lookups served from cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses ({:.1}% hit rate), {} evicted, {} expired",
            self.entry_count,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.expirations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_stats_display() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            evictions: 2,
            expirations: 0,
            entry_count: 5,
        };
        let display = stats.to_string();
        assert!(display.contains("5 entries"));
        assert!(display.contains("75.0% hit rate"));
        assert!(display.contains("2 evicted"));
    }
}
