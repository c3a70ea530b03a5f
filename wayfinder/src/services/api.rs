//! The map lookup contract consumed by caches, the address pipeline and the CLI.

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::types::{
    Bounds, GeocodeResult, LatLng, Place, ReverseGeocodeResult, RouteOptions, RouteResult,
    TrafficIncident, WeatherReport,
};
use crate::error::MapResult;

/// Remote lookups behind the proxy.
///
/// Every call takes a [`CancellationToken`]; implementations should abort the
/// network operation and return [`MapError::Cancelled`](crate::MapError::Cancelled)
/// once it fires.
pub trait MapApi: Send + Sync {
    /// Best match for a free-text place query. `NotFound` when nothing matches.
    fn geocode<'a>(
        &'a self,
        query: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, MapResult<GeocodeResult>>;

    /// Address for a coordinate.
    fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<ReverseGeocodeResult>>;

    /// Current weather at a coordinate.
    fn weather(
        &self,
        lat: f64,
        lng: f64,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<WeatherReport>>;

    /// Route between two points.
    fn route(
        &self,
        start: LatLng,
        end: LatLng,
        options: RouteOptions,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<RouteResult>>;

    /// Incidents reported inside a viewport. An empty list is a valid answer.
    fn traffic_incidents(
        &self,
        bounds: Bounds,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, MapResult<Vec<TrafficIncident>>>;

    /// Points of interest matching `query` inside a viewport.
    fn search_places<'a>(
        &'a self,
        query: &'a str,
        bounds: Bounds,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, MapResult<Vec<Place>>>;
}
