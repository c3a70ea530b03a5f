//! Geolocation: position fixes, the progressive-refinement tracker and the
//! address pipeline fed by it.
//!
//! ```text
//! PositionSource ──► GeolocationTracker ──FixUpdate──► AddressResolutionPipeline
//!  (platform)         (accuracy filter,                 (cache, coalesce,
//!                      progressive timeout)              cancel superseded)
//! ```

mod fix;
mod pipeline;
mod simulated;
mod source;
mod tracker;

pub use fix::{
    coordinate_key, suggested_zoom, AccuracyLevel, PositionFix, ACCEPTABLE_ACCURACY_M,
    COORDINATE_KEY_PRECISION, EXCELLENT_ACCURACY_M, GOOD_ACCURACY_M,
};
pub use pipeline::{AddressFailure, AddressResolutionPipeline, ResolvedAddress};
pub use simulated::{ScriptedReading, SimulatedPositionSource};
pub use source::{PositionOptions, PositionSource, PositionWatch, WatchId};
pub use tracker::{
    GeolocationTracker, StopReason, TrackerConfig, TrackerEvent, TrackerPhase, TrackerState,
    DEFAULT_ACQUIRE_MAX_AGE, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_EXCELLENT_WINDOW,
    DEFAULT_INITIAL_TIMEOUT, DEFAULT_MAX_TIMEOUT, DEFAULT_TIMEOUT_STEP, DEFAULT_WATCH_TIMEOUT,
};
