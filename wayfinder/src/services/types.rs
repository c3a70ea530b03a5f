//! Result types returned by map lookups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geolocation::coordinate_key;

/// A WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Coordinate rounded to 6 decimals, as used in cache keys.
    pub fn key(&self) -> String {
        coordinate_key(self.lat, self.lng)
    }

    /// Returns true for finite coordinates inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// First match for a place search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

impl GeocodeResult {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// Address for a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseGeocodeResult {
    /// Complete formatted address.
    pub full_text: String,
    /// Compact address (house number, road, suburb, locality, postcode).
    pub short_text: String,
}

/// Current conditions at a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: String,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Metres per second.
    pub wind_speed: f64,
    /// Provider icon code, e.g. `"10d"`.
    pub icon: String,
    pub feels_like: Option<f64>,
    /// Hectopascals.
    pub pressure: Option<f64>,
}

impl WeatherReport {
    /// Icon URL on the provider's CDN.
    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }
}

/// Routing objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    #[default]
    Fastest,
    Shortest,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Fastest => "fastest",
            RouteType::Shortest => "shortest",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RouteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastest" => Ok(RouteType::Fastest),
            "shortest" => Ok(RouteType::Shortest),
            other => Err(format!("unknown route type '{}'", other)),
        }
    }
}

/// Options for a route request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RouteOptions {
    pub route_type: RouteType,
    /// Factor live traffic into the duration.
    pub traffic: bool,
}

/// A computed route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Polyline from start to end.
    pub points: Vec<LatLng>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Extra time caused by traffic; zero when traffic was not requested.
    pub traffic_delay_seconds: f64,
}

/// A rectangular map viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Viewport spanned by its south-west and north-east corners.
    pub const fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south: south_west.lat,
            west: south_west.lng,
            north: north_east.lat,
            east: north_east.lng,
        }
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::new(self.south, self.west)
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::new(self.north, self.east)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// Both corners in range and south not above north.
    pub fn is_valid(&self) -> bool {
        self.south_west().is_valid() && self.north_east().is_valid() && self.south <= self.north
    }

    /// `west,south,east,north`, the order providers take a bounding box in.
    pub fn bbox(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    /// Corners rounded to 6 decimals, as used in cache keys.
    pub fn key(&self) -> String {
        format!("{}|{}", self.south_west().key(), self.north_east().key())
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] - [{}]", self.south_west(), self.north_east())
    }
}

/// A reported traffic disruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficIncident {
    /// Provider incident type, e.g. `"ACCIDENT"` or `"ROAD_WORKS"`.
    pub kind: String,
    pub description: String,
    /// Free-form address of the affected stretch; empty when unknown.
    pub location: String,
    pub position: Option<LatLng>,
    /// Delay caused by the incident, when the provider reports one.
    pub delay_seconds: Option<f64>,
}

/// A point of interest from a places search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub category: Option<String>,
    pub address: String,
    pub position: LatLng,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlng_key() {
        assert_eq!(LatLng::new(48.8566, 2.3522).key(), "48.856600,2.352200");
    }

    #[test]
    fn test_route_type_parse() {
        assert_eq!("Fastest".parse::<RouteType>(), Ok(RouteType::Fastest));
        assert_eq!("shortest".parse::<RouteType>(), Ok(RouteType::Shortest));
        assert!("scenic".parse::<RouteType>().is_err());
    }

    #[test]
    fn test_route_type_serde() {
        let json = serde_json::to_string(&RouteType::Shortest).unwrap();
        assert_eq!(json, "\"shortest\"");
    }

    #[test]
    fn test_weather_icon_url() {
        let report = WeatherReport {
            temperature: 18.0,
            description: "light rain".into(),
            humidity: 70.0,
            wind_speed: 3.5,
            icon: "10d".into(),
            feels_like: None,
            pressure: None,
        };
        assert_eq!(
            report.icon_url(),
            "https://openweathermap.org/img/wn/10d@2x.png"
        );
    }

    #[test]
    fn test_bounds_bbox_order() {
        let bounds = Bounds::new(LatLng::new(48.8, 2.2), LatLng::new(48.9, 2.4));
        assert_eq!(bounds.bbox(), "2.2,48.8,2.4,48.9");
        assert_eq!(bounds.key(), "48.800000,2.200000|48.900000,2.400000");
        assert!((bounds.center().lat - 48.85).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_validity() {
        assert!(Bounds::new(LatLng::new(-1.0, -1.0), LatLng::new(1.0, 1.0)).is_valid());
        assert!(!Bounds::new(LatLng::new(1.0, -1.0), LatLng::new(-1.0, 1.0)).is_valid());
        assert!(!Bounds::new(LatLng::new(-1.0, -1.0), LatLng::new(91.0, 1.0)).is_valid());
    }
}
