//! Settings structs for each configuration section.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::geolocation::{
    PositionOptions, TrackerConfig, DEFAULT_ACQUIRE_MAX_AGE, DEFAULT_ACQUIRE_TIMEOUT,
    DEFAULT_EXCELLENT_WINDOW, DEFAULT_INITIAL_TIMEOUT, DEFAULT_MAX_TIMEOUT, DEFAULT_TIMEOUT_STEP,
    DEFAULT_WATCH_TIMEOUT,
};
use crate::logging::{LoggingConfig, DEFAULT_LOG_FILE};
use crate::services::{ProxyConfig, DEFAULT_BASE_URL, DEFAULT_HTTP_TIMEOUT};
use crate::status::DEFAULT_DISMISS_AFTER;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WayfinderConfig {
    pub proxy: ProxySettings,
    pub cache: CacheSettings,
    pub geolocation: GeolocationSettings,
    pub status: StatusSettings,
    pub logging: LoggingSettings,
}

/// `[proxy]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

/// `[geolocation]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeolocationSettings {
    pub initial_timeout_ms: u64,
    pub timeout_step_ms: u64,
    pub max_timeout_ms: u64,
    pub excellent_window_ms: u64,
}

impl Default for GeolocationSettings {
    fn default() -> Self {
        Self {
            initial_timeout_ms: DEFAULT_INITIAL_TIMEOUT.as_millis() as u64,
            timeout_step_ms: DEFAULT_TIMEOUT_STEP.as_millis() as u64,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT.as_millis() as u64,
            excellent_window_ms: DEFAULT_EXCELLENT_WINDOW.as_millis() as u64,
        }
    }
}

/// `[status]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSettings {
    pub dismiss_ms: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            dismiss_ms: DEFAULT_DISMISS_AFTER.as_millis() as u64,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for the log file; no file output when unset.
    pub directory: Option<PathBuf>,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl WayfinderConfig {
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            base_url: self.proxy.base_url.clone(),
            timeout: Duration::from_secs(self.proxy.timeout_secs),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.cache.max_size, Duration::from_secs(self.cache.ttl_secs))
    }

    /// Tracker timing. One-shot and watch request options keep their fixed
    /// defaults.
    pub fn tracker_config(&self) -> TrackerConfig {
        let geo = &self.geolocation;
        TrackerConfig {
            acquire_options: PositionOptions::high_accuracy(
                DEFAULT_ACQUIRE_TIMEOUT,
                DEFAULT_ACQUIRE_MAX_AGE,
            ),
            watch_options: PositionOptions::high_accuracy(DEFAULT_WATCH_TIMEOUT, Duration::ZERO),
            initial_timeout: Duration::from_millis(geo.initial_timeout_ms),
            timeout_step: Duration::from_millis(geo.timeout_step_ms),
            max_timeout: Duration::from_millis(geo.max_timeout_ms),
            excellent_window: Duration::from_millis(geo.excellent_window_ms),
        }
    }

    pub fn status_dismiss_after(&self) -> Duration {
        Duration::from_millis(self.status.dismiss_ms)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            directory: self.logging.directory.clone(),
            file: self.logging.file.clone(),
            ..LoggingConfig::default()
        }
    }
}
