//! INI serialization logic for converting `WayfinderConfig` → INI string.

use super::settings::WayfinderConfig;

/// Convert a `WayfinderConfig` to a commented INI string for saving.
pub(super) fn to_config_string(config: &WayfinderConfig) -> String {
    let log_directory = config
        .logging
        .directory
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!(
        r#"[proxy]
; Base URL of the map proxy server
base_url = {}
; Request timeout in seconds
timeout_secs = {}

[cache]
; Maximum entries per cache (geocode, reverse geocode, weather, route, address)
max_size = {}
; Entry lifetime in seconds
ttl_secs = {}

[geolocation]
; Initial watch window in milliseconds
initial_timeout_ms = {}
; Window extension each time it elapses without an excellent fix
timeout_step_ms = {}
; Window ceiling; tracking stops once reached
max_timeout_ms = {}
; Window after an excellent (<= 5 m) fix
excellent_window_ms = {}

[status]
; How long status messages stay visible, in milliseconds
dismiss_ms = {}

[logging]
; Directory for the log file (leave empty for console only)
directory = {}
file = {}
"#,
        config.proxy.base_url,
        config.proxy.timeout_secs,
        config.cache.max_size,
        config.cache.ttl_secs,
        config.geolocation.initial_timeout_ms,
        config.geolocation.timeout_step_ms,
        config.geolocation.max_timeout_ms,
        config.geolocation.excellent_window_ms,
        config.status.dismiss_ms,
        log_directory,
        config.logging.file,
    )
}
