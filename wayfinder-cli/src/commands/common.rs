//! Shared helpers for CLI commands.

use std::path::Path;

use wayfinder::config::WayfinderConfig;
use wayfinder::services::{Bounds, LatLng};

use crate::error::CliError;

/// Load the config from `path`, or the default location when `None`.
pub fn load_config(path: Option<&Path>) -> Result<WayfinderConfig, CliError> {
    let config = match path {
        Some(path) => WayfinderConfig::load_from(path)?,
        None => WayfinderConfig::load()?,
    };
    Ok(config)
}

/// Build the multi-threaded runtime commands run on.
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

/// Parse `"lat,lng"`.
pub fn parse_latlng(value: &str) -> Result<LatLng, CliError> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| CliError::InvalidArgument(format!("expected 'lat,lng', got '{}'", value)))?;
    let point = LatLng::new(parse_degrees(lat, value)?, parse_degrees(lng, value)?);
    if !point.is_valid() {
        return Err(CliError::InvalidArgument(format!(
            "coordinate out of range: '{}'",
            value
        )));
    }
    Ok(point)
}

/// Viewport from its `"lat,lng"` south-west and north-east corners.
pub fn parse_bounds(south_west: &str, north_east: &str) -> Result<Bounds, CliError> {
    let bounds = Bounds::new(parse_latlng(south_west)?, parse_latlng(north_east)?);
    if !bounds.is_valid() {
        return Err(CliError::InvalidArgument(format!(
            "south-west corner '{}' lies north of '{}'",
            south_west, north_east
        )));
    }
    Ok(bounds)
}

fn parse_degrees(part: &str, whole: &str) -> Result<f64, CliError> {
    part.trim()
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("invalid coordinate '{}'", whole)))
}
