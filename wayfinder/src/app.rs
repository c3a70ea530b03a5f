//! Application facade owning every cache, service and tracker.
//!
//! There is no global state: each [`AppContext`] wires its own components, so
//! several can coexist (tests build one per case).
//!
//! ```ignore
//! use wayfinder::app::AppContext;
//! use wayfinder::config::WayfinderConfig;
//!
//! let ctx = AppContext::with_proxy(WayfinderConfig::load()?, source)?;
//! ctx.pipeline().on_resolved(|address| println!("{}", address));
//! ctx.start_tracking();
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::WayfinderConfig;
use crate::error::{MapError, MapResult};
use crate::geolocation::{
    AddressResolutionPipeline, GeolocationTracker, PositionSource, TrackerPhase,
};
use crate::services::{MapApi, MapServices, ProxyApi};
use crate::status::StatusMessage;

/// Top-level owner of the map client components.
pub struct AppContext {
    config: WayfinderConfig,
    services: Arc<MapServices>,
    tracker: GeolocationTracker,
    pipeline: Arc<AddressResolutionPipeline>,
}

impl AppContext {
    /// Wire components over an arbitrary API and position source.
    ///
    /// The address pipeline is attached to the tracker.
    pub fn new(
        config: WayfinderConfig,
        api: Arc<dyn MapApi>,
        source: Arc<dyn PositionSource>,
    ) -> Self {
        let cache_config = config.cache_config();
        let services = Arc::new(MapServices::new(Arc::clone(&api), cache_config));
        let tracker = GeolocationTracker::new(source, config.tracker_config());
        let pipeline = AddressResolutionPipeline::new(api, cache_config);
        pipeline.attach(&tracker);

        info!(
            cache_max_size = cache_config.max_size,
            cache_ttl_secs = cache_config.ttl.as_secs(),
            "Application context created"
        );

        Self {
            config,
            services,
            tracker,
            pipeline,
        }
    }

    /// Wire components over the proxy configured in `config`.
    pub fn with_proxy(config: WayfinderConfig, source: Arc<dyn PositionSource>) -> MapResult<Self> {
        let api: Arc<dyn MapApi> = Arc::new(ProxyApi::from_config(&config.proxy_config())?);
        Ok(Self::new(config, api, source))
    }

    pub fn config(&self) -> &WayfinderConfig {
        &self.config
    }

    pub fn services(&self) -> &Arc<MapServices> {
        &self.services
    }

    pub fn tracker(&self) -> &GeolocationTracker {
        &self.tracker
    }

    pub fn pipeline(&self) -> &Arc<AddressResolutionPipeline> {
        &self.pipeline
    }

    /// Start (or restart) geolocation tracking.
    pub fn start_tracking(&self) {
        self.tracker.start();
    }

    /// Stop tracking; pending address lookups are cancelled.
    pub fn stop_tracking(&self) {
        self.tracker.stop();
    }

    /// Empty every cache, including the address cache.
    pub fn clear_all_caches(&self) {
        self.services.clear_caches();
        self.pipeline.clear_cache();
    }

    /// Status message for `error` using the configured display time.
    pub fn status_for(&self, error: &MapError) -> Option<StatusMessage> {
        StatusMessage::from_error(error)
            .map(|msg| msg.dismiss_after(Some(self.config.status_dismiss_after())))
    }

    /// Stop tracking and cancel every in-flight lookup.
    pub fn shutdown(&self) {
        if matches!(
            self.tracker.phase(),
            TrackerPhase::Acquiring | TrackerPhase::Watching
        ) {
            self.tracker.stop();
        }
        let cancelled = self.services.cancel_all();
        self.pipeline.cancel_pending();
        self.services.log_stats();
        info!(cancelled, "Application context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocation::SimulatedPositionSource;
    use crate::services::{MockHttpClient, DEFAULT_BASE_URL};
    use std::time::Duration;

    fn context(body: &str, config: WayfinderConfig) -> AppContext {
        let api: Arc<dyn MapApi> =
            Arc::new(ProxyApi::new(MockHttpClient::json(body), DEFAULT_BASE_URL).unwrap());
        let source: Arc<dyn PositionSource> = Arc::new(SimulatedPositionSource::new());
        AppContext::new(config, api, source)
    }

    #[test]
    fn test_with_proxy_rejects_bad_url() {
        let mut config = WayfinderConfig::default();
        config.proxy.base_url = "nowhere".to_string();
        let source: Arc<dyn PositionSource> = Arc::new(SimulatedPositionSource::new());
        assert!(matches!(
            AppContext::with_proxy(config, source),
            Err(MapError::Config(_))
        ));
    }

    #[test]
    fn test_status_uses_configured_dismiss() {
        let mut config = WayfinderConfig::default();
        config.status.dismiss_ms = 1_200;
        let ctx = context("{}", config);

        let msg = ctx.status_for(&MapError::Timeout("10s".into())).unwrap();
        assert_eq!(msg.dismiss_after, Some(Duration::from_millis(1_200)));
        assert!(ctx.status_for(&MapError::Cancelled).is_none());
    }

    #[tokio::test]
    async fn test_clear_all_caches() {
        let ctx = context(
            r#"{"results":[{"formatted":"Paris, France","geometry":{"lat":48.8566,"lng":2.3522}}]}"#,
            WayfinderConfig::default(),
        );

        ctx.services().geocode("Paris").await.unwrap();
        assert_eq!(ctx.services().stats()[0].cache.entry_count, 1);

        ctx.clear_all_caches();
        assert_eq!(ctx.services().stats()[0].cache.entry_count, 0);
    }

    #[test]
    fn test_shutdown_when_idle() {
        let ctx = context("{}", WayfinderConfig::default());
        ctx.shutdown();
        assert_eq!(ctx.tracker().phase(), TrackerPhase::Idle);
    }
}
