//! Reading and writing `~/.wayfinder/config.ini`.
//!
//! An absent file is not an error: every setting has a default, so a fresh
//! install runs without ever touching disk. Writes go through a sibling
//! `.tmp` file and a rename, so a crash mid-save leaves the old file intact.

use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::WayfinderConfig;

const CONFIG_DIR_NAME: &str = ".wayfinder";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Why the config file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },

    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A key parsed but its value is unusable.
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl WayfinderConfig {
    /// Settings from `~/.wayfinder/config.ini`, or defaults when it is absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Settings from `path`, or defaults when no file is there.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = match Ini::load_from_file(path) {
            Ok(ini) => ini,
            Err(ini::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(ini::Error::Io(source)) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(ini::Error::Parse(source)) => {
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        super::parser::parse_ini(&ini)
    }

    /// Write every setting to `path`, creating missing directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let staging = path.with_extension("ini.tmp");
        std::fs::write(&staging, super::writer::to_config_string(self)).map_err(write_err)?;
        std::fs::rename(&staging, path).map_err(write_err)
    }
}

/// Write the defaults to `path` unless a file is already there.
///
/// Returns true when a new file was created.
pub fn ensure_exists(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    WayfinderConfig::default().save_to(path)?;
    Ok(true)
}

/// `~/.wayfinder`, relative to the working directory when there is no home.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `~/.wayfinder/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_means_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = WayfinderConfig::load_from(&config_path).unwrap();
        assert_eq!(config, WayfinderConfig::default());
    }

    #[test]
    fn test_saved_settings_load_back() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = WayfinderConfig::default();
        config.proxy.base_url = "https://maps.example.com".to_string();
        config.cache.max_size = 42;
        config.geolocation.excellent_window_ms = 2_500;
        config.logging.directory = Some(temp_dir.path().join("logs"));
        config.save_to(&config_path).unwrap();

        let loaded = WayfinderConfig::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
        assert!(!config_path.with_extension("ini.tmp").exists());
    }

    #[test]
    fn test_bad_value_names_section_and_key() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, "[status]\ndismiss_ms = soon\n").unwrap();

        let err = WayfinderConfig::load_from(&config_path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: status.dismiss_ms = 'soon' - must be a non-negative integer (milliseconds)"
        );
    }

    #[test]
    fn test_unparseable_file_names_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, "[proxy\nbase_url = x\n").unwrap();

        let err = WayfinderConfig::load_from(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.ini"));
    }

    #[test]
    fn test_ensure_exists_leaves_existing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        assert!(ensure_exists(&config_path).unwrap());
        std::fs::write(&config_path, "[cache]\nmax_size = 7\n").unwrap();
        assert!(!ensure_exists(&config_path).unwrap());
        assert_eq!(WayfinderConfig::load_from(&config_path).unwrap().cache.max_size, 7);
    }

    #[test]
    fn test_default_location() {
        assert!(config_file_path().ends_with(".wayfinder/config.ini"));
    }
}
