//! INI parsing logic for converting `Ini` → `WayfinderConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};
use reqwest::Url;

use super::file::ConfigError;
use super::settings::WayfinderConfig;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse `section.key` as a number, keeping `current` when the key is absent.
fn number<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    current: T,
    reason: &str,
) -> Result<T, ConfigError> {
    match props.get(key) {
        Some(v) => v.trim().parse().map_err(|_| invalid(section, key, v, reason)),
        None => Ok(current),
    }
}

fn positive_ms(props: &Properties, section: &str, key: &str, current: u64) -> Result<u64, ConfigError> {
    let reason = "must be a positive integer (milliseconds)";
    let value = number(props, section, key, current, reason)?;
    if value == 0 {
        return Err(invalid(section, key, "0", reason));
    }
    Ok(value)
}

/// Parse an `Ini` object into a `WayfinderConfig`.
///
/// Starts from `WayfinderConfig::default()` and overlays any values found in
/// the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<WayfinderConfig, ConfigError> {
    let mut config = WayfinderConfig::default();

    // [proxy] section
    if let Some(section) = ini.section(Some("proxy")) {
        if let Some(v) = section.get("base_url") {
            let v = v.trim();
            match Url::parse(v) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    config.proxy.base_url = v.to_string();
                }
                _ => {
                    return Err(invalid(
                        "proxy",
                        "base_url",
                        v,
                        "must be an http:// or https:// URL",
                    ))
                }
            }
        }
        config.proxy.timeout_secs = number(
            section,
            "proxy",
            "timeout_secs",
            config.proxy.timeout_secs,
            "must be a positive integer (seconds)",
        )?;
        if config.proxy.timeout_secs == 0 {
            return Err(invalid(
                "proxy",
                "timeout_secs",
                "0",
                "must be a positive integer (seconds)",
            ));
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        config.cache.max_size = number(
            section,
            "cache",
            "max_size",
            config.cache.max_size,
            "must be a non-negative integer",
        )?;
        config.cache.ttl_secs = number(
            section,
            "cache",
            "ttl_secs",
            config.cache.ttl_secs,
            "must be a non-negative integer (seconds)",
        )?;
    }

    // [geolocation] section
    if let Some(section) = ini.section(Some("geolocation")) {
        let geo = &mut config.geolocation;
        geo.initial_timeout_ms =
            positive_ms(section, "geolocation", "initial_timeout_ms", geo.initial_timeout_ms)?;
        geo.timeout_step_ms =
            positive_ms(section, "geolocation", "timeout_step_ms", geo.timeout_step_ms)?;
        geo.max_timeout_ms =
            positive_ms(section, "geolocation", "max_timeout_ms", geo.max_timeout_ms)?;
        geo.excellent_window_ms = positive_ms(
            section,
            "geolocation",
            "excellent_window_ms",
            geo.excellent_window_ms,
        )?;
        if geo.max_timeout_ms < geo.initial_timeout_ms {
            return Err(invalid(
                "geolocation",
                "max_timeout_ms",
                &geo.max_timeout_ms.to_string(),
                "must not be less than initial_timeout_ms",
            ));
        }
    }

    // [status] section
    if let Some(section) = ini.section(Some("status")) {
        config.status.dismiss_ms = number(
            section,
            "status",
            "dismiss_ms",
            config.status.dismiss_ms,
            "must be a non-negative integer (milliseconds)",
        )?;
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.logging.directory = if v.is_empty() {
                None
            } else {
                Some(expand_tilde(v))
            };
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid("logging", "file", v, "must not be empty"));
            }
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

/// Expand a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<WayfinderConfig, ConfigError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), WayfinderConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            "[proxy]\nbase_url = https://maps.example.com\ntimeout_secs = 4\n\
             [cache]\nmax_size = 25\nttl_secs = 60\n\
             [geolocation]\ninitial_timeout_ms = 10000\nmax_timeout_ms = 20000\n\
             [status]\ndismiss_ms = 1500\n",
        )
        .unwrap();

        assert_eq!(config.proxy.base_url, "https://maps.example.com");
        assert_eq!(config.proxy.timeout_secs, 4);
        assert_eq!(config.cache.max_size, 25);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.geolocation.initial_timeout_ms, 10_000);
        assert_eq!(config.geolocation.timeout_step_ms, 5_000);
        assert_eq!(config.geolocation.max_timeout_ms, 20_000);
        assert_eq!(config.status.dismiss_ms, 1_500);
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("[cache]\nmax_size = lots\n").unwrap_err();
        match err {
            ConfigError::InvalidValue {
                section, key, value, ..
            } => {
                assert_eq!(section, "cache");
                assert_eq!(key, "max_size");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(parse("[proxy]\nbase_url = ftp://example.com\n").is_err());
        assert!(parse("[proxy]\nbase_url = localhost\n").is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert!(parse("[proxy]\ntimeout_secs = 0\n").is_err());
        assert!(parse("[geolocation]\ntimeout_step_ms = 0\n").is_err());
    }

    #[test]
    fn test_ceiling_below_initial_rejected() {
        let err = parse("[geolocation]\ninitial_timeout_ms = 20000\nmax_timeout_ms = 15000\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_timeout_ms"));
    }

    #[test]
    fn test_logging_directory() {
        let config = parse("[logging]\ndirectory = /var/log/wayfinder\nfile = maps.log\n").unwrap();
        assert_eq!(
            config.logging.directory,
            Some(PathBuf::from("/var/log/wayfinder"))
        );
        assert_eq!(config.logging.file, "maps.log");

        let config = parse("[logging]\ndirectory =\n").unwrap();
        assert_eq!(config.logging.directory, None);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/logs"), home.join("logs"));
        }
    }
}
