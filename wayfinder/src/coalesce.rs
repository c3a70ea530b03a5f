//! Request coalescing for identical concurrent lookups.
//!
//! When several callers ask for the same logical resource at once (the same
//! search string, the same rounded coordinate), only the first one triggers a
//! network call. Later callers receive a handle to the same shared task and
//! observe exactly the same outcome.
//!
//! ```text
//! caller A ─┐
//!           │                                  factory(token)
//! caller B ─┼──► RequestCoalescer ──[key]──► one in-flight task
//!           │          │                          │
//! caller C ─┘          ▼                          ▼
//!              [A, B, C resolve with the same Result]
//! ```
//!
//! Each in-flight task owns a [`CancellationToken`]. [`RequestCoalescer::cancel`]
//! fires it, deregisters the key and makes every waiter resolve with
//! [`MapError::Cancelled`] at once. The factory's future keeps running on its
//! own driver task until it notices the token and exits; whatever it returns
//! after a cancel is discarded. The task deregisters itself when it settles,
//! so the next request for the key starts fresh.
//!
//! Registration uses `DashMap`'s entry API so check-and-insert is atomic.
//! Tasks are driven on the tokio runtime, so they complete (and deregister)
//! even if every caller drops its handle; `request` must therefore be called
//! from within a runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{MapError, MapResult};

type SharedTask<T> = Shared<BoxFuture<'static, MapResult<T>>>;

struct InFlight<T: Clone> {
    id: u64,
    token: CancellationToken,
    task: SharedTask<T>,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that joined an existing in-flight task
    pub coalesced_requests: u64,
    /// Requests that invoked their factory
    pub new_requests: u64,
    /// In-flight tasks cancelled before settling
    pub cancelled_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Deduplicates concurrent requests by key.
pub struct RequestCoalescer<T: Clone> {
    in_flight: Arc<DashMap<String, InFlight<T>>>,
    next_id: AtomicU64,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
    cancelled_requests: AtomicU64,
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new request coalescer.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
            cancelled_requests: AtomicU64::new(0),
        }
    }

    /// Request the resource identified by `key`.
    ///
    /// If a task for `key` is already in flight the returned handle shares it
    /// and `factory` is not called. Otherwise `factory` is called once with a
    /// fresh cancellation token; the future it returns should observe the
    /// token and abort its network operation when it fires.
    ///
    /// `factory` runs while the key's slot is locked and must not call back
    /// into this coalescer.
    pub fn request<F, Fut>(&self, key: &str, factory: F) -> CoalescedRequest<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = MapResult<T>> + Send + 'static,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let task = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Coalescing request - joining in-flight task");
                return CoalescedRequest {
                    key: key.to_string(),
                    coalesced: true,
                    task: entry.get().task.clone(),
                };
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let token = CancellationToken::new();
                let work = factory(token.clone());

                let registry = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let (done_tx, done_rx) = oneshot::channel();
                // The driver owns `work` until it exits on its own, so the
                // factory's future observes the token instead of being dropped.
                tokio::spawn(async move {
                    let outcome = work.await;
                    // A cancel (or a newer task under the same key) may have
                    // replaced us already; only remove our own registration.
                    registry.remove_if(&owned_key, |_, in_flight| in_flight.id == id);
                    let _ = done_tx.send(outcome);
                });

                let watch_token = token.clone();
                let task = async move {
                    tokio::select! {
                        biased;
                        _ = watch_token.cancelled() => Err(MapError::Cancelled),
                        outcome = done_rx => outcome.unwrap_or(Err(MapError::Cancelled)),
                    }
                }
                .boxed()
                .shared();

                entry.insert(InFlight {
                    id,
                    token,
                    task: task.clone(),
                });
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key,
                    in_flight_count = self.in_flight.len(),
                    "New request - starting task"
                );
                task
            }
        };

        CoalescedRequest {
            key: key.to_string(),
            coalesced: false,
            task,
        }
    }

    /// Cancel the in-flight task for `key`.
    ///
    /// Every waiter resolves with [`MapError::Cancelled`] and the key is
    /// deregistered immediately. Returns false (and does nothing) if no task
    /// is in flight for `key`.
    pub fn cancel(&self, key: &str) -> bool {
        match self.in_flight.remove(key) {
            Some((_, in_flight)) => {
                in_flight.token.cancel();
                self.cancelled_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cancelled in-flight request");
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight task. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<String> = self.in_flight.iter().map(|e| e.key().clone()).collect();
        keys.iter().filter(|key| self.cancel(key)).count()
    }

    /// Returns true if a task for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Returns the number of currently in-flight requests.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
            cancelled_requests: self.cancelled_requests.load(Ordering::Relaxed),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self, name: &str) {
        let stats = self.stats();
        info!(
            coalescer = name,
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            cancelled = stats.cancelled_requests,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Request coalescing statistics"
        );
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a (possibly shared) in-flight request.
///
/// Resolves to the same `Result` for every caller that requested the key
/// while the task was in flight.
#[must_use = "a coalesced request does nothing for the caller unless awaited"]
pub struct CoalescedRequest<T: Clone> {
    key: String,
    coalesced: bool,
    task: SharedTask<T>,
}

impl<T: Clone> CoalescedRequest<T> {
    /// The key this request was registered under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true if this handle joined a task started by another caller.
    pub fn is_coalesced(&self) -> bool {
        self.coalesced
    }
}

impl<T: Clone> Future for CoalescedRequest<T> {
    type Output = MapResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.task.poll_unpin(cx)
    }
}
