//! Position fixes and accuracy classification.

use std::fmt;

use tokio::time::Instant;

/// Fixes at or below this radius (metres) are EXCELLENT.
pub const EXCELLENT_ACCURACY_M: f64 = 5.0;

/// Fixes at or below this radius (metres) are GOOD.
pub const GOOD_ACCURACY_M: f64 = 10.0;

/// Fixes at or below this radius (metres) are ACCEPTABLE.
pub const ACCEPTABLE_ACCURACY_M: f64 = 20.0;

/// Decimal places used for coordinate keys (~0.11 m at the equator).
pub const COORDINATE_KEY_PRECISION: i32 = 6;

/// Accuracy class of a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccuracyLevel {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl AccuracyLevel {
    /// Classify an accuracy radius in metres.
    pub fn from_accuracy(accuracy_m: f64) -> Self {
        if accuracy_m <= EXCELLENT_ACCURACY_M {
            AccuracyLevel::Excellent
        } else if accuracy_m <= GOOD_ACCURACY_M {
            AccuracyLevel::Good
        } else if accuracy_m <= ACCEPTABLE_ACCURACY_M {
            AccuracyLevel::Acceptable
        } else {
            AccuracyLevel::Poor
        }
    }

    /// Label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            AccuracyLevel::Excellent => "excellent",
            AccuracyLevel::Good => "good",
            AccuracyLevel::Acceptable => "acceptable",
            AccuracyLevel::Poor => "poor",
        }
    }
}

impl fmt::Display for AccuracyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map zoom level to centre on a fix with the given accuracy radius.
pub fn suggested_zoom(accuracy_m: f64) -> u8 {
    if accuracy_m <= 10.0 {
        18
    } else if accuracy_m <= 50.0 {
        17
    } else if accuracy_m <= 100.0 {
        16
    } else {
        15
    }
}

/// Round a coordinate to key precision, normalising negative zero.
fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_KEY_PRECISION);
    (value * scale).round() / scale + 0.0
}

/// Cache key for a coordinate pair, rounded to 6 decimal places.
///
/// ```
/// use wayfinder::geolocation::coordinate_key;
///
/// assert_eq!(coordinate_key(48.85661234, 2.35222199), "48.856612,2.352222");
/// ```
pub fn coordinate_key(lat: f64, lng: f64) -> String {
    format!("{:.6},{:.6}", round_coordinate(lat), round_coordinate(lng))
}

/// A single geolocation reading.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Radius of the 95% confidence circle in metres.
    pub accuracy_m: f64,
    /// When the platform captured this reading.
    pub captured_at: Instant,
    /// Altitude in metres, if reported.
    pub altitude_m: Option<f64>,
    /// Heading in degrees clockwise from north, if reported.
    pub heading_deg: Option<f64>,
    /// Ground speed in metres per second, if reported.
    pub speed_mps: Option<f64>,
}

impl PositionFix {
    /// Create a fix captured now.
    pub fn new(lat: f64, lng: f64, accuracy_m: f64) -> Self {
        Self::with_timestamp(lat, lng, accuracy_m, Instant::now())
    }

    /// Create a fix with an explicit capture time.
    pub fn with_timestamp(lat: f64, lng: f64, accuracy_m: f64, captured_at: Instant) -> Self {
        Self {
            lat,
            lng,
            accuracy_m,
            captured_at,
            altitude_m: None,
            heading_deg: None,
            speed_mps: None,
        }
    }

    /// Attach motion data reported alongside the position.
    pub fn with_motion(
        mut self,
        altitude_m: Option<f64>,
        heading_deg: Option<f64>,
        speed_mps: Option<f64>,
    ) -> Self {
        self.altitude_m = altitude_m;
        self.heading_deg = heading_deg;
        self.speed_mps = speed_mps;
        self
    }

    /// Accuracy class of this fix.
    pub fn accuracy_level(&self) -> AccuracyLevel {
        AccuracyLevel::from_accuracy(self.accuracy_m)
    }

    /// Returns true for fixes at or below the EXCELLENT threshold.
    pub fn is_excellent(&self) -> bool {
        self.accuracy_level() == AccuracyLevel::Excellent
    }

    /// Strictly smaller accuracy radius than `other`.
    pub fn is_more_accurate_than(&self, other: &PositionFix) -> bool {
        self.accuracy_m < other.accuracy_m
    }

    /// A usable reading has finite coordinates and a non-negative, finite radius.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && self.accuracy_m.is_finite()
            && self.accuracy_m >= 0.0
    }

    /// Key used for address caching and request coalescing.
    pub fn coordinate_key(&self) -> String {
        coordinate_key(self.lat, self.lng)
    }

    /// Ground speed in km/h, if reported.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|mps| mps * 3.6)
    }
}

impl fmt::Display for PositionFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}, {:.6} (±{}m)",
            self.lat,
            self.lng,
            self.accuracy_m.round()
        )
    }
}
