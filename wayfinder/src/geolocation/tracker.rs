//! Progressive-refinement geolocation tracker.
//!
//! # State Machine
//!
//! ```text
//! Idle --start()--> Acquiring --[fix | error | timeout]--> Watching
//! Watching --[window elapsed, best fix EXCELLENT]--> Stopped
//! Watching --[window elapsed, timeout < ceiling]--> Watching (timeout += step)
//! Watching --[window elapsed, timeout at ceiling]--> Stopped
//! any --stop()--> Stopped
//! ```
//!
//! Acquiring asks the platform for one quick fix (15 s timeout, readings up to
//! 3 s old accepted). Watching then streams high-accuracy readings and keeps
//! only strictly better ones. The watch window starts at 15 s; each time it
//! elapses without an EXCELLENT fix it grows by 5 s and re-arms for 5 s, until
//! the 30 s ceiling. An EXCELLENT fix shrinks the window to at most 5 s from
//! that fix.
//!
//! Provider errors are reported to subscribers but never end the session.
//!
//! # Events
//!
//! Subscribers either register callbacks (`on_fix_update`, `on_error`,
//! `on_stopped`), which run synchronously in emission order, or take a
//! broadcast receiver from [`GeolocationTracker::subscribe`]. Callbacks are
//! never invoked while the tracker's own lock is held.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fix::PositionFix;
use super::source::{PositionOptions, PositionSource, PositionWatch, WatchId};
use crate::error::MapError;

/// Default timeout for the initial one-shot fix.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Oldest cached reading accepted for the initial fix.
pub const DEFAULT_ACQUIRE_MAX_AGE: Duration = Duration::from_millis(3_000);

/// Per-update timeout while watching.
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Initial length of the watch window.
pub const DEFAULT_INITIAL_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Growth of the watch window each time it elapses.
pub const DEFAULT_TIMEOUT_STEP: Duration = Duration::from_millis(5_000);

/// Ceiling of the watch window.
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Window after an EXCELLENT fix before the tracker stops.
pub const DEFAULT_EXCELLENT_WINDOW: Duration = Duration::from_millis(5_000);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Timing configuration for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Options for the initial one-shot request.
    pub acquire_options: PositionOptions,
    /// Options for the continuous watch.
    pub watch_options: PositionOptions,
    /// Initial watch window.
    pub initial_timeout: Duration,
    /// Window extension each time it elapses.
    pub timeout_step: Duration,
    /// Window ceiling.
    pub max_timeout: Duration,
    /// Window after an EXCELLENT fix.
    pub excellent_window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            acquire_options: PositionOptions::high_accuracy(
                DEFAULT_ACQUIRE_TIMEOUT,
                DEFAULT_ACQUIRE_MAX_AGE,
            ),
            watch_options: PositionOptions::high_accuracy(DEFAULT_WATCH_TIMEOUT, Duration::ZERO),
            initial_timeout: DEFAULT_INITIAL_TIMEOUT,
            timeout_step: DEFAULT_TIMEOUT_STEP,
            max_timeout: DEFAULT_MAX_TIMEOUT,
            excellent_window: DEFAULT_EXCELLENT_WINDOW,
        }
    }
}

/// Lifecycle phase of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Idle,
    Acquiring,
    Watching,
    Stopped,
}

impl fmt::Display for TrackerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackerPhase::Idle => "idle",
            TrackerPhase::Acquiring => "acquiring",
            TrackerPhase::Watching => "watching",
            TrackerPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a tracking session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// `start()` was called while a session was running.
    Restarted,
    /// An EXCELLENT fix was held for the reduced window.
    AccuracyReached,
    /// The window reached its ceiling without an EXCELLENT fix.
    MaxWaitElapsed,
}

impl StopReason {
    /// Returns true when the session was ended by the caller rather than by
    /// the timeout policy. Pending work for the old session should be dropped.
    pub fn is_interruption(&self) -> bool {
        matches!(self, StopReason::Requested | StopReason::Restarted)
    }
}

/// Event emitted to subscribers.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// A strictly better fix was accepted.
    FixUpdate(PositionFix),
    /// The provider reported an error; tracking continues.
    Error(MapError),
    /// The session ended.
    Stopped(StopReason),
}

/// Snapshot of the tracker's state.
#[derive(Debug, Clone)]
pub struct TrackerState {
    pub best_fix: Option<PositionFix>,
    pub timeout: Duration,
    pub phase: TrackerPhase,
}

type FixCallback = Arc<dyn Fn(&PositionFix) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&MapError) + Send + Sync>;
type StopCallback = Arc<dyn Fn(StopReason) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    fix: Vec<FixCallback>,
    error: Vec<ErrorCallback>,
    stopped: Vec<StopCallback>,
}

struct Session {
    token: CancellationToken,
    watch_id: Option<WatchId>,
}

struct TrackerInner {
    state: TrackerState,
    session: Option<Session>,
    generation: u64,
}

impl TrackerInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.session.is_some()
    }
}

/// What to do when the watch window elapses.
enum WindowOutcome {
    Extend(Duration),
    Stop(StopReason),
    Stale,
}

struct TrackerShared {
    source: Arc<dyn PositionSource>,
    config: TrackerConfig,
    inner: Mutex<TrackerInner>,
    subscribers: RwLock<Subscribers>,
    events: broadcast::Sender<TrackerEvent>,
}

/// Geolocation tracker with progressive accuracy refinement.
///
/// Cloning yields another handle to the same tracker.
///
/// # Example
///
/// ```ignore
/// let tracker = GeolocationTracker::new(source, TrackerConfig::default());
/// tracker.on_fix_update(|fix| println!("{}", fix));
/// tracker.start();
/// ```
#[derive(Clone)]
pub struct GeolocationTracker {
    shared: Arc<TrackerShared>,
}

impl fmt::Debug for GeolocationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("GeolocationTracker")
            .field("config", &self.shared.config)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

impl GeolocationTracker {
    /// Create an idle tracker reading from `source`.
    pub fn new(source: Arc<dyn PositionSource>, config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(TrackerShared {
                source,
                config,
                inner: Mutex::new(TrackerInner {
                    state: TrackerState {
                        best_fix: None,
                        timeout: config.initial_timeout,
                        phase: TrackerPhase::Idle,
                    },
                    session: None,
                    generation: 0,
                }),
                subscribers: RwLock::new(Subscribers::default()),
                events,
            }),
        }
    }

    /// Register a callback for accepted fixes.
    pub fn on_fix_update<F>(&self, callback: F)
    where
        F: Fn(&PositionFix) + Send + Sync + 'static,
    {
        self.shared.subscribers.write().fix.push(Arc::new(callback));
    }

    /// Register a callback for provider errors.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&MapError) + Send + Sync + 'static,
    {
        self.shared.subscribers.write().error.push(Arc::new(callback));
    }

    /// Register a callback for the end of a session.
    pub fn on_stopped<F>(&self, callback: F)
    where
        F: Fn(StopReason) + Send + Sync + 'static,
    {
        self.shared.subscribers.write().stopped.push(Arc::new(callback));
    }

    /// Receive every event through a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.shared.events.subscribe()
    }

    /// Begin a tracking session, resetting any running one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let shared = &self.shared;
        let (previous, token, generation) = {
            let mut inner = shared.inner.lock();
            let previous = inner.session.take();
            inner.generation += 1;
            inner.state = TrackerState {
                best_fix: None,
                timeout: shared.config.initial_timeout,
                phase: TrackerPhase::Acquiring,
            };
            let token = CancellationToken::new();
            inner.session = Some(Session {
                token: token.clone(),
                watch_id: None,
            });
            (previous, token, inner.generation)
        };

        if let Some(previous) = previous {
            shared.end_session(previous);
            shared.emit(TrackerEvent::Stopped(StopReason::Restarted));
        }

        info!(generation, "Geolocation tracking started");
        tokio::spawn(run_session(Arc::clone(shared), token, generation));
    }

    /// End the current session from any state.
    ///
    /// Clears the platform watch, forgets the best fix and notifies `on_stopped`
    /// subscribers with [`StopReason::Requested`] so they can cancel pending
    /// work such as address lookups.
    pub fn stop(&self) {
        let shared = &self.shared;
        let session = {
            let mut inner = shared.inner.lock();
            inner.generation += 1;
            inner.state = TrackerState {
                best_fix: None,
                timeout: shared.config.initial_timeout,
                phase: TrackerPhase::Stopped,
            };
            inner.session.take()
        };

        if let Some(session) = session {
            shared.end_session(session);
        }
        info!("Geolocation tracking stopped by request");
        shared.emit(TrackerEvent::Stopped(StopReason::Requested));
    }

    /// Current phase.
    pub fn phase(&self) -> TrackerPhase {
        self.shared.inner.lock().state.phase
    }

    /// Most accurate fix of the current session.
    pub fn best_fix(&self) -> Option<PositionFix> {
        self.shared.inner.lock().state.best_fix.clone()
    }

    /// Current watch window length.
    pub fn timeout(&self) -> Duration {
        self.shared.inner.lock().state.timeout
    }

    /// Snapshot of the whole state.
    pub fn state(&self) -> TrackerState {
        self.shared.inner.lock().state.clone()
    }

    /// Timing configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }
}

impl TrackerShared {
    fn emit(&self, event: TrackerEvent) {
        match &event {
            TrackerEvent::FixUpdate(fix) => {
                let callbacks = self.subscribers.read().fix.clone();
                for callback in callbacks {
                    callback(fix);
                }
            }
            TrackerEvent::Error(error) => {
                let callbacks = self.subscribers.read().error.clone();
                for callback in callbacks {
                    callback(error);
                }
            }
            TrackerEvent::Stopped(reason) => {
                let callbacks = self.subscribers.read().stopped.clone();
                for callback in callbacks {
                    callback(*reason);
                }
            }
        }
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn end_session(&self, session: Session) {
        session.token.cancel();
        if let Some(id) = session.watch_id {
            self.source.clear_watch(id);
            debug!(watch = %id, "Cleared platform watch");
        }
    }

    /// Apply the accuracy filter. Returns the reduced window when the fix is
    /// EXCELLENT.
    fn handle_fix(&self, generation: u64, fix: PositionFix) -> Option<Duration> {
        if !fix.is_valid() {
            warn!(fix = ?fix, "Discarding invalid position reading");
            return None;
        }

        let window = {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation) {
                return None;
            }
            if let Some(best) = &inner.state.best_fix {
                if !fix.is_more_accurate_than(best) {
                    debug!(
                        accuracy_m = fix.accuracy_m,
                        best_m = best.accuracy_m,
                        "Discarding fix no better than current best"
                    );
                    return None;
                }
            }

            inner.state.best_fix = Some(fix.clone());
            if fix.is_excellent() {
                inner.state.timeout = inner.state.timeout.min(self.config.excellent_window);
                Some(inner.state.timeout)
            } else {
                None
            }
        };

        debug!(
            accuracy_m = fix.accuracy_m,
            level = %fix.accuracy_level(),
            "Accepted improved fix"
        );
        self.emit(TrackerEvent::FixUpdate(fix));
        window
    }

    fn report_error(&self, generation: u64, error: MapError) {
        if !self.inner.lock().is_current(generation) {
            return;
        }
        warn!(error = %error, "Geolocation provider error");
        self.emit(TrackerEvent::Error(error));
    }

    /// Start the platform watch and move to Watching.
    fn begin_watching(&self, generation: u64) -> Option<PositionWatch> {
        let watch = self.source.watch_position(self.config.watch_options);
        {
            let mut inner = self.inner.lock();
            if inner.is_current(generation) {
                inner.state.phase = TrackerPhase::Watching;
                if let Some(session) = inner.session.as_mut() {
                    session.watch_id = Some(watch.id);
                }
                info!(watch = %watch.id, "Watching for more accurate fixes");
                return Some(watch);
            }
        }
        self.source.clear_watch(watch.id);
        None
    }

    fn on_window_elapsed(&self, generation: u64) -> WindowOutcome {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            return WindowOutcome::Stale;
        }

        let excellent = inner
            .state
            .best_fix
            .as_ref()
            .is_some_and(PositionFix::is_excellent);

        if excellent {
            WindowOutcome::Stop(StopReason::AccuracyReached)
        } else if inner.state.timeout < self.config.max_timeout {
            inner.state.timeout = (inner.state.timeout + self.config.timeout_step)
                .min(self.config.max_timeout);
            debug!(
                timeout_ms = inner.state.timeout.as_millis() as u64,
                "Extending geolocation window"
            );
            WindowOutcome::Extend(self.config.timeout_step)
        } else {
            WindowOutcome::Stop(StopReason::MaxWaitElapsed)
        }
    }

    /// Auto-stop from the timeout policy. Keeps the best fix.
    fn finish(&self, generation: u64, reason: StopReason) {
        let session = {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation) {
                return;
            }
            inner.state.phase = TrackerPhase::Stopped;
            inner.session.take()
        };

        if let Some(session) = session {
            self.end_session(session);
        }
        info!(reason = ?reason, "Geolocation tracking finished");
        self.emit(TrackerEvent::Stopped(reason));
    }
}

async fn run_session(shared: Arc<TrackerShared>, token: CancellationToken, generation: u64) {
    let acquire = shared.config.acquire_options;
    let initial = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = tokio::time::timeout(acquire.timeout, shared.source.current_position(acquire)) => {
            result.unwrap_or_else(|_| {
                Err(MapError::Timeout(format!(
                    "no initial fix within {}ms",
                    acquire.timeout.as_millis()
                )))
            })
        }
    };

    match initial {
        Ok(fix) => {
            shared.handle_fix(generation, fix);
        }
        Err(error) => shared.report_error(generation, error),
    }

    let Some(PositionWatch { mut updates, .. }) = shared.begin_watching(generation) else {
        return;
    };

    let mut deadline = Instant::now() + shared.config.initial_timeout;
    if let Some(best) = shared.inner.lock().state.best_fix.as_ref() {
        if best.is_excellent() {
            deadline = deadline.min(Instant::now() + shared.config.excellent_window);
        }
    }
    let mut watch_open = true;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = sleep_until(deadline) => match shared.on_window_elapsed(generation) {
                WindowOutcome::Extend(rearm) => deadline = Instant::now() + rearm,
                WindowOutcome::Stop(reason) => {
                    shared.finish(generation, reason);
                    return;
                }
                WindowOutcome::Stale => return,
            },
            update = updates.recv(), if watch_open => match update {
                Some(Ok(fix)) => {
                    if let Some(window) = shared.handle_fix(generation, fix) {
                        deadline = deadline.min(Instant::now() + window);
                    }
                }
                Some(Err(error)) => shared.report_error(generation, error),
                None => {
                    debug!("Platform watch closed; waiting for timeout policy");
                    watch_open = false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocation::SimulatedPositionSource;

    fn fix(accuracy_m: f64) -> PositionFix {
        PositionFix::new(51.505, -0.09, accuracy_m)
    }

    fn tracker_with(source: &Arc<SimulatedPositionSource>) -> GeolocationTracker {
        let dyn_source: Arc<dyn PositionSource> = source.clone();
        GeolocationTracker::new(dyn_source, TrackerConfig::default())
    }

    /// Let spawned tasks run without crossing any tracker deadline.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn record_accuracies(tracker: &GeolocationTracker) -> Arc<Mutex<Vec<f64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tracker.on_fix_update(move |fix| sink.lock().push(fix.accuracy_m));
        seen
    }

    fn record_stops(tracker: &GeolocationTracker) -> Arc<Mutex<Vec<StopReason>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tracker.on_stopped(move |reason| sink.lock().push(reason));
        seen
    }

    #[test]
    fn test_new_tracker_is_idle() {
        let source = Arc::new(SimulatedPositionSource::new());
        let tracker = tracker_with(&source);
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert!(tracker.best_fix().is_none());
        assert_eq!(tracker.timeout(), Duration::from_millis(15_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fix_then_watching() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(40.0)));
        let tracker = tracker_with(&source);
        let seen = record_accuracies(&tracker);

        tracker.start();
        assert_eq!(tracker.phase(), TrackerPhase::Acquiring);
        settle().await;

        assert_eq!(tracker.phase(), TrackerPhase::Watching);
        assert_eq!(*seen.lock(), vec![40.0]);
        assert_eq!(source.active_watch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_options() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(40.0)));
        let tracker = tracker_with(&source);

        tracker.start();
        settle().await;

        let single = source.single_shot_requests();
        assert_eq!(single.len(), 1);
        assert!(single[0].high_accuracy);
        assert_eq!(single[0].timeout, Duration::from_millis(15_000));
        assert_eq!(single[0].maximum_age, Duration::from_millis(3_000));

        let watch = source.watch_requests();
        assert_eq!(watch.len(), 1);
        assert!(watch[0].high_accuracy);
        assert_eq!(watch[0].timeout, Duration::from_millis(15_000));
        assert_eq!(watch[0].maximum_age, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accuracy_filter_keeps_only_improvements() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(20.0)));
        let tracker = tracker_with(&source);
        let seen = record_accuracies(&tracker);

        tracker.start();
        settle().await;
        for accuracy in [15.0, 18.0, 8.0] {
            source.emit(Ok(fix(accuracy)));
            settle().await;
        }

        assert_eq!(*seen.lock(), vec![20.0, 15.0, 8.0]);
        assert_eq!(tracker.best_fix().map(|f| f.accuracy_m), Some(8.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_accuracy_is_discarded() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(12.0)));
        let tracker = tracker_with(&source);
        let seen = record_accuracies(&tracker);

        tracker.start();
        settle().await;
        source.emit(Ok(fix(12.0)));
        settle().await;

        assert_eq!(*seen.lock(), vec![12.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_reading_is_discarded() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(30.0)));
        let tracker = tracker_with(&source);
        let seen = record_accuracies(&tracker);

        tracker.start();
        settle().await;
        source.emit(Ok(fix(f64::NAN)));
        source.emit(Ok(fix(-3.0)));
        settle().await;

        assert_eq!(*seen.lock(), vec![30.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_excellent_fix_stops_within_window() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(20.0)));
        let tracker = tracker_with(&source);
        let stops = record_stops(&tracker);

        tracker.start();
        settle().await;
        source.emit(Ok(fix(4.0)));
        settle().await;
        assert_eq!(tracker.timeout(), Duration::from_millis(5_000));

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(tracker.phase(), TrackerPhase::Watching);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        assert_eq!(*stops.lock(), vec![StopReason::AccuracyReached]);
        assert_eq!(tracker.best_fix().map(|f| f.accuracy_m), Some(4.0));
        assert_eq!(source.active_watch_count(), 0);
        assert_eq!(source.cleared_watches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_excellent_initial_fix_stops_early() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(3.0)));
        let tracker = tracker_with(&source);

        tracker.start();
        settle().await;
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progressive_timeout_reaches_ceiling() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(25.0)));
        let tracker = tracker_with(&source);
        let stops = record_stops(&tracker);

        tracker.start();
        settle().await;

        tokio::time::sleep(Duration::from_millis(15_100)).await;
        assert_eq!(tracker.phase(), TrackerPhase::Watching);
        assert_eq!(tracker.timeout(), Duration::from_millis(20_000));

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(tracker.timeout(), Duration::from_millis(30_000));
        assert_eq!(tracker.phase(), TrackerPhase::Watching);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        assert_eq!(*stops.lock(), vec![StopReason::MaxWaitElapsed]);
        assert_eq!(tracker.best_fix().map(|f| f.accuracy_m), Some(25.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_excellent_during_extension_stops_at_next_check() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(25.0)));
        let tracker = tracker_with(&source);
        let stops = record_stops(&tracker);

        tracker.start();
        settle().await;
        tokio::time::sleep(Duration::from_millis(16_000)).await;

        source.emit(Ok(fix(5.0)));
        settle().await;
        assert_eq!(tracker.timeout(), Duration::from_millis(5_000));

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        assert_eq!(*stops.lock(), vec![StopReason::AccuracyReached]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_failure_moves_to_watching() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Err(MapError::ProviderUnavailable(
            "position unavailable".into(),
        )));
        let tracker = tracker_with(&source);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        tracker.on_error(move |e| sink.lock().push(e.clone()));

        tracker.start();
        settle().await;

        assert_eq!(tracker.phase(), TrackerPhase::Watching);
        assert_eq!(errors.lock().len(), 1);
        assert!(tracker.best_fix().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_timeout_reported_as_timeout() {
        let source = Arc::new(SimulatedPositionSource::new());
        let tracker = tracker_with(&source);
        let mut events = tracker.subscribe();

        tracker.start();
        tokio::time::sleep(Duration::from_millis(15_001)).await;

        assert_eq!(tracker.phase(), TrackerPhase::Watching);
        match events.recv().await.unwrap() {
            TrackerEvent::Error(MapError::Timeout(_)) => {}
            other => panic!("expected timeout error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_errors_do_not_end_watching() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(30.0)));
        let tracker = tracker_with(&source);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        tracker.on_error(move |e| sink.lock().push(e.clone()));

        tracker.start();
        settle().await;
        source.emit(Err(MapError::PermissionDenied("denied".into())));
        source.emit(Err(MapError::Timeout("15s".into())));
        settle().await;

        assert_eq!(tracker.phase(), TrackerPhase::Watching);
        assert_eq!(errors.lock().len(), 2);

        source.emit(Ok(fix(9.0)));
        settle().await;
        assert_eq!(tracker.best_fix().map(|f| f.accuracy_m), Some(9.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_and_clears_watch() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(30.0)));
        let tracker = tracker_with(&source);
        let stops = record_stops(&tracker);

        tracker.start();
        settle().await;
        tracker.stop();

        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        assert!(tracker.best_fix().is_none());
        assert_eq!(source.active_watch_count(), 0);
        assert_eq!(*stops.lock(), vec![StopReason::Requested]);

        // Readings after stop are ignored
        source.emit(Ok(fix(2.0)));
        settle().await;
        assert!(tracker.best_fix().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_acquiring() {
        let source = Arc::new(SimulatedPositionSource::new());
        let tracker = tracker_with(&source);

        tracker.start();
        settle().await;
        tracker.stop();

        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        assert!(source.watch_requests().is_empty());
    }

    #[test]
    fn test_stop_from_idle() {
        let source = Arc::new(SimulatedPositionSource::new());
        let tracker = tracker_with(&source);
        let stops = record_stops(&tracker);

        tracker.stop();
        assert_eq!(tracker.phase(), TrackerPhase::Stopped);
        assert_eq!(*stops.lock(), vec![StopReason::Requested]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_clears_previous_session() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(30.0)));
        source.queue_current(Ok(fix(50.0)));
        let tracker = tracker_with(&source);
        let stops = record_stops(&tracker);
        let seen = record_accuracies(&tracker);

        tracker.start();
        settle().await;
        tracker.start();
        settle().await;

        assert_eq!(*stops.lock(), vec![StopReason::Restarted]);
        assert_eq!(source.cleared_watches().len(), 1);
        assert_eq!(source.active_watch_count(), 1);
        // Best fix was reset, so the worse 50m reading is accepted
        assert_eq!(*seen.lock(), vec![30.0, 50.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_subscription() {
        let source = Arc::new(SimulatedPositionSource::new());
        source.queue_current(Ok(fix(30.0)));
        let tracker = tracker_with(&source);
        let mut events = tracker.subscribe();

        tracker.start();
        settle().await;
        tracker.stop();

        assert!(matches!(events.recv().await, Ok(TrackerEvent::FixUpdate(_))));
        assert!(matches!(
            events.recv().await,
            Ok(TrackerEvent::Stopped(StopReason::Requested))
        ));
    }

    #[test]
    fn test_stop_reason_interruption() {
        assert!(StopReason::Requested.is_interruption());
        assert!(StopReason::Restarted.is_interruption());
        assert!(!StopReason::AccuracyReached.is_interruption());
        assert!(!StopReason::MaxWaitElapsed.is_interruption());
    }
}
