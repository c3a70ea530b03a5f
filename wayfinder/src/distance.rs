//! Great-circle distance measurement and display formatting.
//!
//! Distances use a spherical earth of mean radius 6 371 008.8 m, which is
//! well within a fix's accuracy radius for the short paths measured on a map.
//!
//! # Coordinate System
//!
//! - Latitude: degrees north (-90 to 90)
//! - Longitude: degrees east (-180 to 180)
//! - Bearing: degrees true (0-360, 0=north, 90=east)

use std::f64::consts::PI;

use crate::services::LatLng;

/// Mean earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// Great-circle distance between two points in metres.
///
/// ```
/// use wayfinder::distance::haversine_distance_m;
/// use wayfinder::services::LatLng;
///
/// let paris = LatLng::new(48.8566, 2.3522);
/// let london = LatLng::new(51.5074, -0.1278);
/// let d = haversine_distance_m(paris, london);
/// assert!((d - 343_500.0).abs() < 1_000.0);
/// ```
pub fn haversine_distance_m(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat * DEG_TO_RAD;
    let lat2 = b.lat * DEG_TO_RAD;
    let dlat = (b.lat - a.lat) * DEG_TO_RAD;
    let dlng = (b.lng - a.lng) * DEG_TO_RAD;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` towards `b` in degrees (0-360).
pub fn bearing_deg(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat * DEG_TO_RAD;
    let lat2 = b.lat * DEG_TO_RAD;
    let dlng = (b.lng - a.lng) * DEG_TO_RAD;

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    (y.atan2(x) * RAD_TO_DEG).rem_euclid(360.0)
}

/// Total length of a polyline in metres. Zero for fewer than two points.
pub fn path_length_m(points: &[LatLng]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance_m(pair[0], pair[1]))
        .sum()
}

/// `"850m"` below one kilometre, `"1.2km"` otherwise.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// `"45s"`, `"12min"` or `"1h 5min"`.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{}s", seconds.round())
    } else if seconds < 3600.0 {
        format!("{}min", (seconds / 60.0).floor())
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}min", hours, minutes)
    }
}

/// Running distance measurement over clicked points.
#[derive(Debug, Clone, Default)]
pub struct DistanceMeasurement {
    points: Vec<LatLng>,
}

impl DistanceMeasurement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point and return the new total in metres.
    pub fn add_point(&mut self, point: LatLng) -> f64 {
        self.points.push(point);
        self.total_m()
    }

    /// Remove the most recent point.
    pub fn undo(&mut self) -> Option<LatLng> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    /// Length of the most recent segment in metres.
    pub fn last_segment_m(&self) -> Option<f64> {
        match self.points.as_slice() {
            [.., a, b] => Some(haversine_distance_m(*a, *b)),
            _ => None,
        }
    }

    pub fn total_m(&self) -> f64 {
        path_length_m(&self.points)
    }
}
