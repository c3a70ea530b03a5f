//! Map lookups through the proxy, cached and coalesced per resource type.
//!
//! [`MapServices`] puts a [`TtlCache`] and a [`RequestCoalescer`] in front of
//! each [`MapApi`] operation:
//!
//! ```text
//! geocode("Paris") ──► cache "geocode:Paris" ──hit──► Arc<GeocodeResult>
//!                           │ miss
//!                           ▼
//!                 coalescer "geocode:Paris" ──► MapApi::geocode (once)
//!                           │
//!                           └──► cache.set, every waiter gets the same Arc
//! ```
//!
//! Results are handed out as `Arc<T>`, so two lookups answered from the cache
//! return the identical object.

mod api;
mod http;
mod proxy;
mod types;

pub use api::MapApi;
pub use http::{HttpClient, ReqwestClient, DEFAULT_HTTP_TIMEOUT};
pub use proxy::{ProxyApi, ProxyConfig, DEFAULT_BASE_URL};
pub use types::{
    Bounds, GeocodeResult, LatLng, Place, ReverseGeocodeResult, RouteOptions, RouteResult,
    RouteType, TrafficIncident, WeatherReport,
};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheConfig, CacheStats, TtlCache};
use crate::coalesce::{CoalescerStats, RequestCoalescer};
use crate::error::{MapError, MapResult};
use crate::geolocation::coordinate_key;

/// Cache and coalescer statistics for one resource type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceStats {
    pub name: &'static str,
    pub cache: CacheStats,
    pub coalescer: CoalescerStats,
}

/// One cached, coalesced lookup type.
struct CachedResource<T> {
    name: &'static str,
    cache: Arc<TtlCache<Arc<T>>>,
    coalescer: RequestCoalescer<Arc<T>>,
}

impl<T: Send + Sync + 'static> CachedResource<T> {
    fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            cache: Arc::new(TtlCache::with_config(config)),
            coalescer: RequestCoalescer::new(),
        }
    }

    /// Serve `key` from the cache, or run `fetch` once for all concurrent
    /// callers and cache its success.
    async fn get_or_fetch<F, Fut>(&self, key: String, fetch: F) -> MapResult<Arc<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = MapResult<T>> + Send + 'static,
    {
        if let Some(hit) = self.cache.get(&key) {
            debug!(resource = self.name, key = %key, "Cache hit");
            return Ok(hit);
        }

        let cache = Arc::clone(&self.cache);
        let cache_key = key.clone();
        self.coalescer
            .request(&key, move |token| {
                let cancelled = token.clone();
                let work = fetch(token);
                async move {
                    let value = Arc::new(work.await?);
                    if !cancelled.is_cancelled() {
                        cache.set(&cache_key, Arc::clone(&value));
                    }
                    Ok(value)
                }
            })
            .await
    }

    fn clear(&self) {
        self.cache.clear();
    }

    fn contains(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    fn stats(&self) -> ResourceStats {
        ResourceStats {
            name: self.name,
            cache: self.cache.stats(),
            coalescer: self.coalescer.stats(),
        }
    }
}

/// Cache key for a route request.
pub fn route_key(start: LatLng, end: LatLng, options: RouteOptions) -> String {
    format!(
        "route:{}|{}|{}:{}",
        start.key(),
        end.key(),
        options.route_type,
        options.traffic
    )
}

/// Cache key for a places search.
pub fn places_key(query: &str, bounds: Bounds) -> String {
    format!("places:{}|{}", query, bounds.key())
}

/// Cached, coalesced map lookups.
pub struct MapServices {
    api: Arc<dyn MapApi>,
    geocode: CachedResource<GeocodeResult>,
    reverse: CachedResource<ReverseGeocodeResult>,
    weather: CachedResource<WeatherReport>,
    route: CachedResource<RouteResult>,
    traffic: CachedResource<Vec<TrafficIncident>>,
    places: CachedResource<Vec<Place>>,
}

impl MapServices {
    /// Wrap `api` with one cache of `config` per resource type.
    pub fn new(api: Arc<dyn MapApi>, config: CacheConfig) -> Self {
        Self {
            api,
            geocode: CachedResource::new("geocode", config),
            reverse: CachedResource::new("reverse", config),
            weather: CachedResource::new("weather", config),
            route: CachedResource::new("route", config),
            traffic: CachedResource::new("traffic", config),
            places: CachedResource::new("places", config),
        }
    }

    /// The underlying API.
    pub fn api(&self) -> &Arc<dyn MapApi> {
        &self.api
    }

    /// Best match for `query`, cached under `geocode:{query}`.
    pub async fn geocode(&self, query: &str) -> MapResult<Arc<GeocodeResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MapError::NotFound("empty search query".to_string()));
        }

        let api = Arc::clone(&self.api);
        let owned = query.to_string();
        self.geocode
            .get_or_fetch(format!("geocode:{}", query), move |token| async move {
                api.geocode(&owned, token).await
            })
            .await
    }

    /// Address at a coordinate, cached under `reverse:{lat},{lng}`.
    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> MapResult<Arc<ReverseGeocodeResult>> {
        let api = Arc::clone(&self.api);
        self.reverse
            .get_or_fetch(
                format!("reverse:{}", coordinate_key(lat, lng)),
                move |token| async move { api.reverse_geocode(lat, lng, token).await },
            )
            .await
    }

    /// Weather at a coordinate, cached under `weather:{lat},{lng}`.
    pub async fn weather(&self, lat: f64, lng: f64) -> MapResult<Arc<WeatherReport>> {
        let api = Arc::clone(&self.api);
        self.weather
            .get_or_fetch(
                format!("weather:{}", coordinate_key(lat, lng)),
                move |token| async move { api.weather(lat, lng, token).await },
            )
            .await
    }

    /// Route between two points, cached per endpoints and options.
    pub async fn route(
        &self,
        start: LatLng,
        end: LatLng,
        options: RouteOptions,
    ) -> MapResult<Arc<RouteResult>> {
        if !start.is_valid() || !end.is_valid() {
            return Err(MapError::NotFound(format!(
                "invalid route endpoints {} -> {}",
                start, end
            )));
        }

        let api = Arc::clone(&self.api);
        self.route
            .get_or_fetch(route_key(start, end, options), move |token| async move {
                api.route(start, end, options, token).await
            })
            .await
    }

    /// Incidents inside `bounds`, cached under `traffic:{south-west}|{north-east}`.
    pub async fn traffic_incidents(&self, bounds: Bounds) -> MapResult<Arc<Vec<TrafficIncident>>> {
        if !bounds.is_valid() {
            return Err(MapError::NotFound(format!("invalid bounds {}", bounds)));
        }

        let api = Arc::clone(&self.api);
        self.traffic
            .get_or_fetch(format!("traffic:{}", bounds.key()), move |token| async move {
                api.traffic_incidents(bounds, token).await
            })
            .await
    }

    /// Places matching `query` inside `bounds`, cached per query and viewport.
    pub async fn search_places(&self, query: &str, bounds: Bounds) -> MapResult<Arc<Vec<Place>>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MapError::NotFound("empty search query".to_string()));
        }
        if !bounds.is_valid() {
            return Err(MapError::NotFound(format!("invalid bounds {}", bounds)));
        }

        let api = Arc::clone(&self.api);
        let owned = query.to_string();
        self.places
            .get_or_fetch(places_key(query, bounds), move |token| async move {
                api.search_places(&owned, bounds, token).await
            })
            .await
    }

    /// Returns true if a live entry is cached under `key`, e.g. `geocode:Paris`.
    ///
    /// Does not count as a hit or a miss.
    pub fn is_cached(&self, key: &str) -> bool {
        self.geocode.contains(key)
            || self.reverse.contains(key)
            || self.weather.contains(key)
            || self.route.contains(key)
            || self.traffic.contains(key)
            || self.places.contains(key)
    }

    /// Empty every cache.
    pub fn clear_caches(&self) {
        self.geocode.clear();
        self.reverse.clear();
        self.weather.clear();
        self.route.clear();
        self.traffic.clear();
        self.places.clear();
        info!("Map service caches cleared");
    }

    /// Cancel every in-flight lookup. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        self.geocode.coalescer.cancel_all()
            + self.reverse.coalescer.cancel_all()
            + self.weather.coalescer.cancel_all()
            + self.route.coalescer.cancel_all()
            + self.traffic.coalescer.cancel_all()
            + self.places.coalescer.cancel_all()
    }

    /// Statistics for every resource type, geocode first.
    pub fn stats(&self) -> [ResourceStats; 6] {
        [
            self.geocode.stats(),
            self.reverse.stats(),
            self.weather.stats(),
            self.route.stats(),
            self.traffic.stats(),
            self.places.stats(),
        ]
    }

    /// Log cache and coalescing statistics.
    pub fn log_stats(&self) {
        for stats in self.stats() {
            info!(
                resource = stats.name,
                entries = stats.cache.entry_count,
                hits = stats.cache.hits,
                misses = stats.cache.misses,
                hit_rate = format!("{:.1}%", stats.cache.hit_rate() * 100.0),
                coalesced = stats.coalescer.coalesced_requests,
                "Map service statistics"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const PARIS: &str =
        r#"{"results":[{"formatted":"Paris, France","geometry":{"lat":48.8566,"lng":2.3522}}]}"#;

    fn services(body: &str) -> (MapServices, Arc<ProxyApi<MockHttpClient>>) {
        let proxy = Arc::new(ProxyApi::new(MockHttpClient::json(body), DEFAULT_BASE_URL).unwrap());
        let api: Arc<dyn MapApi> = proxy.clone();
        (MapServices::new(api, CacheConfig::default()), proxy)
    }

    fn request_count(proxy: &ProxyApi<MockHttpClient>) -> usize {
        proxy.client().request_count()
    }

    #[tokio::test]
    async fn test_geocode_is_cached() {
        let (services, proxy) = services(PARIS);

        let first = services.geocode("Paris").await.unwrap();
        let second = services.geocode("Paris").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(request_count(&proxy), 1);
        assert_eq!(services.stats()[0].cache.hits, 1);
    }

    #[tokio::test]
    async fn test_geocode_cached_under_query_key() {
        let (services, _proxy) = services(PARIS);

        services.geocode("  Paris ").await.unwrap();

        assert!(services.is_cached("geocode:Paris"));
        assert!(!services.is_cached("geocode:  Paris "));
        assert!(!services.is_cached("geocode:London"));
        // Peeking leaves the statistics alone.
        assert_eq!(services.stats()[0].cache.hits, 0);
    }

    #[tokio::test]
    async fn test_concurrent_geocode_is_coalesced() {
        let (services, proxy) = services(PARIS);

        let (a, b) = tokio::join!(services.geocode("Paris"), services.geocode("Paris"));

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(request_count(&proxy), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_not_found() {
        let (services, proxy) = services(PARIS);

        let err = services.geocode("   ").await.unwrap_err();
        assert!(matches!(err, MapError::NotFound(_)));
        assert_eq!(request_count(&proxy), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (services, proxy) = services(r#"{"results":[]}"#);

        assert!(services.geocode("Atlantis").await.is_err());
        assert!(services.geocode("Atlantis").await.is_err());
        assert_eq!(request_count(&proxy), 2);
    }

    #[tokio::test]
    async fn test_clear_caches_forces_refetch() {
        let (services, proxy) = services(PARIS);

        services.geocode("Paris").await.unwrap();
        services.clear_caches();
        services.geocode("Paris").await.unwrap();

        assert_eq!(request_count(&proxy), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let (services, proxy) = services(PARIS);

        services.geocode("Paris").await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        services.geocode("Paris").await.unwrap();

        assert_eq!(request_count(&proxy), 2);
    }

    #[tokio::test]
    async fn test_reverse_key_uses_rounded_coordinate() {
        let (services, proxy) = services(r#"{"display_name":"Somewhere","address":{}}"#);

        services.reverse_geocode(48.8566001, 2.3522001).await.unwrap();
        services.reverse_geocode(48.8565999, 2.3521999).await.unwrap();

        assert_eq!(request_count(&proxy), 1);
    }

    #[test]
    fn test_route_key() {
        let options = RouteOptions {
            route_type: RouteType::Shortest,
            traffic: true,
        };
        assert_eq!(
            route_key(LatLng::new(1.0, 2.0), LatLng::new(3.0, 4.0), options),
            "route:1.000000,2.000000|3.000000,4.000000|shortest:true"
        );
    }

    #[tokio::test]
    async fn test_invalid_route_endpoints() {
        let (services, proxy) = services("{}");
        let err = services
            .route(
                LatLng::new(f64::NAN, 0.0),
                LatLng::new(0.0, 0.0),
                RouteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::NotFound(_)));
        assert_eq!(request_count(&proxy), 0);
    }

    fn paris_bounds() -> Bounds {
        Bounds::new(LatLng::new(48.8, 2.2), LatLng::new(48.9, 2.4))
    }

    #[tokio::test]
    async fn test_traffic_incidents_cached_per_bounds() {
        let (services, proxy) = services(
            r#"{"incidents":[{"type":"JAM","shortDescription":"Slow traffic"}]}"#,
        );

        let first = services.traffic_incidents(paris_bounds()).await.unwrap();
        let second = services.traffic_incidents(paris_bounds()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first[0].kind, "JAM");
        assert_eq!(request_count(&proxy), 1);
        assert!(services.is_cached("traffic:48.800000,2.200000|48.900000,2.400000"));
        assert_eq!(services.stats()[4].name, "traffic");
    }

    #[tokio::test]
    async fn test_invalid_bounds_skip_the_proxy() {
        let (services, proxy) = services("{}");
        let inverted = Bounds::new(LatLng::new(48.9, 2.2), LatLng::new(48.8, 2.4));

        let err = services.traffic_incidents(inverted).await.unwrap_err();
        assert!(matches!(err, MapError::NotFound(_)));
        let err = services.search_places("cafe", inverted).await.unwrap_err();
        assert!(matches!(err, MapError::NotFound(_)));
        assert_eq!(request_count(&proxy), 0);
    }

    #[tokio::test]
    async fn test_places_cached_per_query_and_bounds() {
        let (services, proxy) = services(
            r#"{"features":[{"properties":{"name":"Cafe de Flore","formatted":"172 Bd Saint-Germain"},
                             "geometry":{"coordinates":[2.3326,48.8541]}}]}"#,
        );
        let wider = Bounds::new(LatLng::new(48.7, 2.1), LatLng::new(49.0, 2.5));

        let (a, b) = tokio::join!(
            services.search_places("cafe", paris_bounds()),
            services.search_places("cafe", paris_bounds())
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(request_count(&proxy), 1);

        services.search_places("cafe", wider).await.unwrap();
        assert_eq!(request_count(&proxy), 2);
        assert!(services.is_cached(&places_key("cafe", paris_bounds())));

        let err = services.search_places(" ", paris_bounds()).await.unwrap_err();
        assert!(matches!(err, MapError::NotFound(_)));
        assert_eq!(request_count(&proxy), 2);
    }

    #[test]
    fn test_places_key() {
        assert_eq!(
            places_key("cafe", paris_bounds()),
            "places:cafe|48.800000,2.200000|48.900000,2.400000"
        );
    }
}
