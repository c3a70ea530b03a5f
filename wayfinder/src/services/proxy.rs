//! [`MapApi`] over the proxy's JSON endpoints.
//!
//! The proxy forwards provider responses mostly untouched, so this module
//! reshapes the provider JSON into the crate's result types:
//!
//! | Endpoint | Provider shape |
//! |----------|----------------|
//! | `/api/geocode?q=` | OpenCage `results[].formatted/geometry` |
//! | `/api/reverse?lat=&lon=` | Nominatim `display_name` + `address` |
//! | `/api/weather?lat=&lon=` | OpenWeatherMap `main`/`wind`/`weather[]` |
//! | `/api/route?start=&end=&type=&traffic=` | TomTom `routes[].summary/legs[].points` |
//! | `/api/traffic?bbox=` | TomTom `incidents[]` |
//! | `/api/places?text=&rect=` | Geoapify `features[].properties/geometry` |
//!
//! Bounding boxes travel as `west,south,east,north`.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::api::MapApi;
use super::http::{HttpClient, ReqwestClient, DEFAULT_HTTP_TIMEOUT};
use super::types::{
    Bounds, GeocodeResult, LatLng, Place, ReverseGeocodeResult, RouteOptions, RouteResult,
    TrafficIncident, WeatherReport,
};
use crate::error::{MapError, MapResult};

/// Default proxy location.
pub const DEFAULT_BASE_URL: &str = "http://localhost:10000";

/// Connection settings for the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Proxy-backed implementation of [`MapApi`].
pub struct ProxyApi<C: HttpClient> {
    client: C,
    base_url: Url,
}

impl ProxyApi<ReqwestClient> {
    /// Connect to the proxy with a reqwest client built from `config`.
    pub fn from_config(config: &ProxyConfig) -> MapResult<Self> {
        let client = ReqwestClient::with_timeout(config.timeout)?;
        Self::new(client, &config.base_url)
    }
}

impl<C: HttpClient> ProxyApi<C> {
    /// Create an API over `client` rooted at `base_url`.
    pub fn new(client: C, base_url: &str) -> MapResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MapError::Config(format!("invalid proxy URL '{}': {}", base_url, e)))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> MapResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| MapError::Config(format!("invalid endpoint '{}': {}", path, e)))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url, cancel: &CancellationToken) -> MapResult<T> {
        debug!(url = %url, "Proxy request");
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MapError::Cancelled),
            body = self.client.get(url.as_str()) => body?,
        };
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_geocode(&self, query: &str, cancel: CancellationToken) -> MapResult<GeocodeResult> {
        let url = self.endpoint("/api/geocode", &[("q", query.to_string())])?;
        let response: OpenCageResponse = self.fetch(url, &cancel).await?;
        response
            .results
            .into_iter()
            .next()
            .map(|first| GeocodeResult {
                lat: first.geometry.lat,
                lng: first.geometry.lng,
                display_name: first.formatted,
            })
            .ok_or_else(|| MapError::NotFound(format!("no results for '{}'", query)))
    }

    async fn fetch_reverse(
        &self,
        lat: f64,
        lng: f64,
        cancel: CancellationToken,
    ) -> MapResult<ReverseGeocodeResult> {
        let url = self.endpoint(
            "/api/reverse",
            &[("lat", lat.to_string()), ("lon", lng.to_string())],
        )?;
        let response: NominatimResponse = self.fetch(url, &cancel).await?;
        let full_text = match (response.display_name, response.error) {
            (Some(name), _) if !name.is_empty() => name,
            (_, Some(error)) => return Err(MapError::NotFound(error)),
            _ => return Err(MapError::NotFound(format!("no address at {},{}", lat, lng))),
        };
        Ok(ReverseGeocodeResult {
            short_text: response.address.short_text(),
            full_text,
        })
    }

    async fn fetch_weather(
        &self,
        lat: f64,
        lng: f64,
        cancel: CancellationToken,
    ) -> MapResult<WeatherReport> {
        let url = self.endpoint(
            "/api/weather",
            &[("lat", lat.to_string()), ("lon", lng.to_string())],
        )?;
        let response: OpenWeatherResponse = self.fetch(url, &cancel).await?;
        let condition = response.weather.into_iter().next().unwrap_or_default();
        Ok(WeatherReport {
            temperature: response.main.temp,
            description: if condition.description.is_empty() {
                "No data".to_string()
            } else {
                condition.description
            },
            humidity: response.main.humidity,
            wind_speed: response.wind.speed,
            icon: condition.icon,
            feels_like: response.main.feels_like,
            pressure: response.main.pressure,
        })
    }

    async fn fetch_route(
        &self,
        start: LatLng,
        end: LatLng,
        options: RouteOptions,
        cancel: CancellationToken,
    ) -> MapResult<RouteResult> {
        let url = self.endpoint(
            "/api/route",
            &[
                ("start", format!("{},{}", start.lat, start.lng)),
                ("end", format!("{},{}", end.lat, end.lng)),
                ("type", options.route_type.as_str().to_string()),
                ("traffic", options.traffic.to_string()),
            ],
        )?;
        let response: TomTomResponse = self.fetch(url, &cancel).await?;
        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| MapError::NotFound(format!("no route from {} to {}", start, end)))?;

        let points = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.points)
            .map(|p| LatLng::new(p.latitude, p.longitude))
            .collect();

        Ok(RouteResult {
            points,
            distance_meters: route.summary.length_in_meters,
            duration_seconds: route.summary.travel_time_in_seconds,
            traffic_delay_seconds: route.summary.traffic_delay_in_seconds.unwrap_or(0.0),
        })
    }

    async fn fetch_traffic(
        &self,
        bounds: Bounds,
        cancel: CancellationToken,
    ) -> MapResult<Vec<TrafficIncident>> {
        let url = self.endpoint("/api/traffic", &[("bbox", bounds.bbox())])?;
        let response: TomTomIncidentsResponse = self.fetch(url, &cancel).await?;
        Ok(response
            .incidents
            .into_iter()
            .map(TomTomIncident::into_incident)
            .collect())
    }

    async fn fetch_places(
        &self,
        query: &str,
        bounds: Bounds,
        cancel: CancellationToken,
    ) -> MapResult<Vec<Place>> {
        let url = self.endpoint(
            "/api/places",
            &[("text", query.to_string()), ("rect", bounds.bbox())],
        )?;
        let response: GeoapifyResponse = self.fetch(url, &cancel).await?;
        let places: Vec<Place> = response
            .features
            .into_iter()
            .filter_map(GeoapifyFeature::into_place)
            .collect();
        debug!(query, found = places.len(), "Places search answered");
        Ok(places)
    }
}

impl<C: HttpClient + 'static> MapApi for ProxyApi<C> {
    fn geocode<'a>(
        &'a self,
        query: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, MapResult<GeocodeResult>> {
        self.fetch_geocode(query, cancel).boxed()
    }

    fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<ReverseGeocodeResult>> {
        self.fetch_reverse(lat, lng, cancel).boxed()
    }

    fn weather(
        &self,
        lat: f64,
        lng: f64,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<WeatherReport>> {
        self.fetch_weather(lat, lng, cancel).boxed()
    }

    fn route(
        &self,
        start: LatLng,
        end: LatLng,
        options: RouteOptions,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<RouteResult>> {
        self.fetch_route(start, end, options, cancel).boxed()
    }

    fn traffic_incidents(
        &self,
        bounds: Bounds,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<Vec<TrafficIncident>>> {
        self.fetch_traffic(bounds, cancel).boxed()
    }

    fn search_places<'a>(
        &'a self,
        query: &'a str,
        bounds: Bounds,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, MapResult<Vec<Place>>> {
        self.fetch_places(query, bounds, cancel).boxed()
    }
}

// Provider response shapes

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    formatted: String,
    geometry: OpenCageGeometry,
}

#[derive(Debug, Deserialize)]
struct OpenCageGeometry {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    postcode: Option<String>,
}

impl NominatimAddress {
    /// House number, road, suburb, locality and postcode, comma-separated.
    fn short_text(&self) -> String {
        let locality = self
            .city
            .as_ref()
            .or(self.town.as_ref())
            .or(self.village.as_ref());
        [
            self.house_number.as_ref(),
            self.road.as_ref(),
            self.suburb.as_ref(),
            locality,
            self.postcode.as_ref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    main: OpenWeatherMain,
    #[serde(default)]
    wind: OpenWeatherWind,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: f64,
    pressure: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenWeatherWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OpenWeatherCondition {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct TomTomResponse {
    #[serde(default)]
    routes: Vec<TomTomRoute>,
}

#[derive(Debug, Deserialize)]
struct TomTomRoute {
    summary: TomTomSummary,
    #[serde(default)]
    legs: Vec<TomTomLeg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TomTomSummary {
    length_in_meters: f64,
    travel_time_in_seconds: f64,
    traffic_delay_in_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomTomLeg {
    #[serde(default)]
    points: Vec<TomTomPoint>,
}

#[derive(Debug, Deserialize)]
struct TomTomPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct TomTomIncidentsResponse {
    #[serde(default)]
    incidents: Vec<TomTomIncident>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TomTomIncident {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    location: TomTomIncidentLocation,
    delay_in_seconds: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomTomIncidentLocation {
    #[serde(default)]
    address: TomTomAddress,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TomTomAddress {
    #[serde(default)]
    freeform_address: String,
}

impl TomTomIncident {
    fn into_incident(self) -> TrafficIncident {
        let position = match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        };
        TrafficIncident {
            kind: self.kind,
            description: self.short_description,
            location: self.location.address.freeform_address,
            position,
            delay_seconds: self.delay_in_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeoapifyResponse {
    #[serde(default)]
    features: Vec<GeoapifyFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoapifyFeature {
    #[serde(default)]
    properties: GeoapifyProperties,
    geometry: GeoapifyGeometry,
}

#[derive(Debug, Default, Deserialize)]
struct GeoapifyProperties {
    name: Option<String>,
    category: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    formatted: String,
}

#[derive(Debug, Deserialize)]
struct GeoapifyGeometry {
    /// GeoJSON order: longitude first.
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl GeoapifyFeature {
    /// `None` for features without a usable point.
    fn into_place(self) -> Option<Place> {
        let [lng, lat, ..] = self.geometry.coordinates[..] else {
            return None;
        };
        let props = self.properties;
        let name = props
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| props.formatted.clone());
        Some(Place {
            name,
            category: props.category.or_else(|| props.categories.into_iter().next()),
            address: props.formatted,
            position: LatLng::new(lat, lng),
        })
    }
}
