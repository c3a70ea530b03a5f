//! Address resolution for accepted position fixes.
//!
//! Every fix the tracker accepts is turned into an address:
//!
//! 1. The fix is keyed by its coordinate rounded to 6 decimals.
//! 2. A cached address for the key is emitted at once.
//! 3. Otherwise the lookup for the previous key is cancelled and a new
//!    reverse-geocode is issued. A fix whose key is already in flight joins
//!    that lookup.
//! 4. When the lookup settles, the result is cached and emitted only if its
//!    key is still the latest. Cancellations are silent; other failures are
//!    reported together with the fix so callers can still show coordinates.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::fix::PositionFix;
use super::tracker::GeolocationTracker;
use crate::cache::{CacheConfig, TtlCache};
use crate::coalesce::RequestCoalescer;
use crate::error::{MapError, MapResult};
use crate::services::MapApi;

/// Address resolved for a coordinate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Coordinate rounded to 6 decimals, `"{lat},{lng}"`.
    pub coordinate_key: String,
    pub full_text: String,
    pub short_text: String,
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.short_text.is_empty() {
            f.write_str(&self.full_text)
        } else {
            f.write_str(&self.short_text)
        }
    }
}

/// A lookup that failed for a reason other than being superseded.
#[derive(Debug, Clone)]
pub struct AddressFailure {
    pub fix: PositionFix,
    pub error: MapError,
}

type ResolvedCallback = Arc<dyn Fn(&ResolvedAddress) + Send + Sync>;
type FailedCallback = Arc<dyn Fn(&AddressFailure) + Send + Sync>;

/// Turns accepted fixes into addresses, keeping only the newest lookup alive.
pub struct AddressResolutionPipeline {
    api: Arc<dyn MapApi>,
    cache: TtlCache<ResolvedAddress>,
    coalescer: RequestCoalescer<ResolvedAddress>,
    latest_key: Mutex<Option<String>>,
    resolved: RwLock<Vec<ResolvedCallback>>,
    failed: RwLock<Vec<FailedCallback>>,
}

impl AddressResolutionPipeline {
    pub fn new(api: Arc<dyn MapApi>, cache_config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            api,
            cache: TtlCache::with_config(cache_config),
            coalescer: RequestCoalescer::new(),
            latest_key: Mutex::new(None),
            resolved: RwLock::new(Vec::new()),
            failed: RwLock::new(Vec::new()),
        })
    }

    /// Register a callback for resolved addresses.
    ///
    /// Callbacks run while the pipeline holds its latest-fix lock, so only
    /// the newest fix's address is ever delivered. They must not call back
    /// into the pipeline.
    pub fn on_resolved<F>(&self, callback: F)
    where
        F: Fn(&ResolvedAddress) + Send + Sync + 'static,
    {
        self.resolved.write().push(Arc::new(callback));
    }

    /// Register a callback for failed lookups. The same locking rule as
    /// [`on_resolved`](Self::on_resolved) applies.
    pub fn on_failed<F>(&self, callback: F)
    where
        F: Fn(&AddressFailure) + Send + Sync + 'static,
    {
        self.failed.write().push(Arc::new(callback));
    }

    /// Feed fix updates from `tracker` into this pipeline and drop pending
    /// work when tracking is stopped or restarted.
    ///
    /// The tracker only holds weak references, so dropping the pipeline
    /// detaches it.
    pub fn attach(self: &Arc<Self>, tracker: &GeolocationTracker) {
        let pipeline = Arc::downgrade(self);
        tracker.on_fix_update(move |fix| {
            if let Some(pipeline) = Weak::upgrade(&pipeline) {
                pipeline.handle_fix(fix.clone());
            }
        });

        let pipeline = Arc::downgrade(self);
        tracker.on_stopped(move |reason| {
            if reason.is_interruption() {
                if let Some(pipeline) = Weak::upgrade(&pipeline) {
                    pipeline.cancel_pending();
                }
            }
        });
    }

    /// Resolve the address for `fix`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn handle_fix(self: &Arc<Self>, fix: PositionFix) {
        let key = fix.coordinate_key();

        let request = {
            let mut latest = self.latest_key.lock();
            let previous = latest.replace(key.clone());
            if let Some(previous) = previous.filter(|previous| *previous != key) {
                if self.coalescer.cancel(&previous) {
                    debug!(previous = %previous, key = %key, "Superseded address lookup");
                }
            }

            if let Some(address) = self.cache.get(&key) {
                debug!(key = %key, "Address cache hit");
                self.emit_resolved(&address);
                return;
            }

            if self.coalescer.is_in_flight(&key) {
                debug!(key = %key, "Address lookup already in flight");
                return;
            }

            let api = Arc::clone(&self.api);
            let pipeline = Arc::clone(self);
            let (lat, lng) = (fix.lat, fix.lng);
            let task_key = key.clone();
            self.coalescer.request(&key, move |token| async move {
                let result = api.reverse_geocode(lat, lng, token.clone()).await?;
                let address = ResolvedAddress {
                    coordinate_key: task_key,
                    full_text: result.full_text,
                    short_text: result.short_text,
                };
                if !token.is_cancelled() {
                    pipeline.store_if_latest(&address);
                }
                Ok(address)
            })
        };

        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = request.await;
            pipeline.complete(&key, fix, outcome);
        });
    }

    /// Cancel the pending lookup, if any. Nothing is emitted for it.
    pub fn cancel_pending(&self) {
        let previous = self.latest_key.lock().take();
        if let Some(key) = previous {
            if self.coalescer.cancel(&key) {
                debug!(key = %key, "Cancelled pending address lookup");
            }
        }
    }

    /// Cached address for a coordinate key.
    pub fn cached(&self, coordinate_key: &str) -> Option<ResolvedAddress> {
        self.cache.get(coordinate_key)
    }

    /// Number of lookups currently in flight.
    pub fn pending_count(&self) -> usize {
        self.coalescer.in_flight_count()
    }

    /// Empty the address cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // Runs inside the lookup task, before the key is deregistered, so a fix
    // arriving right after settlement finds the cached address.
    fn store_if_latest(&self, address: &ResolvedAddress) {
        let latest = self.latest_key.lock();
        if latest.as_deref() == Some(address.coordinate_key.as_str()) {
            self.cache.set(&address.coordinate_key, address.clone());
        }
    }

    fn complete(&self, key: &str, fix: PositionFix, outcome: MapResult<ResolvedAddress>) {
        if let Err(MapError::Cancelled) = outcome {
            debug!(key, "Address lookup cancelled");
            return;
        }

        // Held through the callbacks so a newer fix cannot land between the
        // check and the emit.
        let latest = self.latest_key.lock();
        if latest.as_deref() != Some(key) {
            debug!(key, "Discarding stale address lookup");
            return;
        }

        match outcome {
            Ok(address) => {
                debug!(key, address = %address, "Address resolved");
                self.emit_resolved(&address);
            }
            Err(error) => {
                warn!(key, error = %error, "Address lookup failed");
                let failure = AddressFailure { fix, error };
                let callbacks = self.failed.read().clone();
                for callback in callbacks {
                    callback(&failure);
                }
            }
        }
        drop(latest);
    }

    fn emit_resolved(&self, address: &ResolvedAddress) {
        let callbacks = self.resolved.read().clone();
        for callback in callbacks {
            callback(address);
        }
    }
}
