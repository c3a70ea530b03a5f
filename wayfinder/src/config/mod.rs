//! INI configuration (`~/.wayfinder/config.ini`).
//!
//! Every key is optional; missing keys keep their defaults. The loaded
//! [`WayfinderConfig`] converts into the per-component configs:
//!
//! ```
//! use wayfinder::config::WayfinderConfig;
//!
//! let config = WayfinderConfig::default();
//! assert_eq!(config.cache_config().max_size, 100);
//! assert_eq!(config.tracker_config().max_timeout.as_millis(), 30_000);
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ensure_exists, ConfigError};
pub use settings::{
    CacheSettings, GeolocationSettings, LoggingSettings, ProxySettings, StatusSettings,
    WayfinderConfig,
};
