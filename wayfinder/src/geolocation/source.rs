//! Platform geolocation provider abstraction.
//!
//! The tracker never talks to a platform API directly; it goes through
//! [`PositionSource`], which offers the usual three primitives: a one-shot fix,
//! a continuous watch and clearing a watch. This keeps the state machine
//! testable with a simulated source.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use super::fix::PositionFix;
use crate::error::MapResult;

/// Request options passed to the platform provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask the platform for its most accurate positioning method.
    pub high_accuracy: bool,
    /// How long the platform may take to deliver a reading.
    pub timeout: Duration,
    /// Oldest cached reading the platform may return instead of a fresh one.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// High-accuracy options with the given timeout and maximum age.
    pub const fn high_accuracy(timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age,
        }
    }
}

/// Identifier of an active platform watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// A running platform watch.
///
/// Each reading (or provider error) arrives on `updates`. The channel closes
/// once the watch is cleared.
#[derive(Debug)]
pub struct PositionWatch {
    pub id: WatchId,
    pub updates: mpsc::UnboundedReceiver<MapResult<PositionFix>>,
}

/// Platform geolocation provider.
///
/// Errors must be categorized: `PermissionDenied` for a refused permission,
/// `ProviderUnavailable` for "position unavailable" and `Timeout` when the
/// reading exceeded `options.timeout`.
pub trait PositionSource: Send + Sync {
    /// Request a single reading.
    fn current_position(&self, options: PositionOptions) -> BoxFuture<'_, MapResult<PositionFix>>;

    /// Start delivering readings continuously.
    fn watch_position(&self, options: PositionOptions) -> PositionWatch;

    /// Stop a watch started by [`PositionSource::watch_position`].
    fn clear_watch(&self, id: WatchId);
}
