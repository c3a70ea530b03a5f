//! Scriptable position source for tests and offline demos.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::fix::PositionFix;
use super::source::{PositionOptions, PositionSource, PositionWatch, WatchId};
use crate::error::MapResult;

/// One step of a replay script: wait `delay`, then deliver `reading` to every
/// active watch.
#[derive(Debug, Clone)]
pub struct ScriptedReading {
    pub delay: Duration,
    pub reading: MapResult<PositionFix>,
}

impl ScriptedReading {
    pub fn new(delay: Duration, reading: MapResult<PositionFix>) -> Self {
        Self { delay, reading }
    }
}

#[derive(Default)]
struct SimulatedInner {
    single_shot: VecDeque<MapResult<PositionFix>>,
    watches: HashMap<u64, mpsc::UnboundedSender<MapResult<PositionFix>>>,
    next_watch_id: u64,
    cleared: Vec<WatchId>,
    single_shot_options: Vec<PositionOptions>,
    watch_options: Vec<PositionOptions>,
}

/// A [`PositionSource`] driven by the caller.
///
/// One-shot requests are answered from a queue filled with
/// [`queue_current`](Self::queue_current); when the queue is empty the
/// request never resolves, so the tracker's own timeout fires. Readings pushed
/// with [`emit`](Self::emit) go to every active watch.
#[derive(Default)]
pub struct SimulatedPositionSource {
    inner: Mutex<SimulatedInner>,
}

impl SimulatedPositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer to the next one-shot request.
    pub fn queue_current(&self, reading: MapResult<PositionFix>) {
        self.inner.lock().single_shot.push_back(reading);
    }

    /// Deliver a reading to all active watches. Returns how many received it.
    pub fn emit(&self, reading: MapResult<PositionFix>) -> usize {
        let mut inner = self.inner.lock();
        inner
            .watches
            .retain(|_, sender| sender.send(reading.clone()).is_ok());
        inner.watches.len()
    }

    /// Replay a script on the runtime, delivering each reading after its delay.
    pub fn spawn_replay(self: &Arc<Self>, script: Vec<ScriptedReading>) -> JoinHandle<()> {
        let source = Arc::clone(self);
        tokio::spawn(async move {
            for step in script {
                tokio::time::sleep(step.delay).await;
                let delivered = source.emit(step.reading);
                debug!(delivered, "Replayed simulated reading");
            }
        })
    }

    /// Number of watches not yet cleared.
    pub fn active_watch_count(&self) -> usize {
        self.inner.lock().watches.len()
    }

    /// Watches cleared so far, in order.
    pub fn cleared_watches(&self) -> Vec<WatchId> {
        self.inner.lock().cleared.clone()
    }

    /// Options of every one-shot request received.
    pub fn single_shot_requests(&self) -> Vec<PositionOptions> {
        self.inner.lock().single_shot_options.clone()
    }

    /// Options of every watch started.
    pub fn watch_requests(&self) -> Vec<PositionOptions> {
        self.inner.lock().watch_options.clone()
    }
}

impl PositionSource for SimulatedPositionSource {
    fn current_position(&self, options: PositionOptions) -> BoxFuture<'_, MapResult<PositionFix>> {
        let queued = {
            let mut inner = self.inner.lock();
            inner.single_shot_options.push(options);
            inner.single_shot.pop_front()
        };
        match queued {
            Some(reading) => futures::future::ready(reading).boxed(),
            None => futures::future::pending::<MapResult<PositionFix>>().boxed(),
        }
    }

    fn watch_position(&self, options: PositionOptions) -> PositionWatch {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_watch_id;
        inner.next_watch_id += 1;
        inner.watches.insert(id, tx);
        inner.watch_options.push(options);
        PositionWatch {
            id: WatchId(id),
            updates: rx,
        }
    }

    fn clear_watch(&self, id: WatchId) {
        let mut inner = self.inner.lock();
        inner.watches.remove(&id.0);
        inner.cleared.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapError;

    #[tokio::test]
    async fn test_queued_single_shot() {
        let source = SimulatedPositionSource::new();
        source.queue_current(Ok(PositionFix::new(1.0, 2.0, 30.0)));

        let options = PositionOptions::high_accuracy(Duration::from_secs(15), Duration::ZERO);
        let fix = source.current_position(options).await.unwrap();
        assert_eq!(fix.accuracy_m, 30.0);
        assert_eq!(source.single_shot_requests(), vec![options]);
    }

    #[tokio::test]
    async fn test_emit_reaches_active_watches_only() {
        let source = SimulatedPositionSource::new();
        let options = PositionOptions::high_accuracy(Duration::from_secs(15), Duration::ZERO);
        let mut first = source.watch_position(options);
        let second = source.watch_position(options);

        source.clear_watch(second.id);
        assert_eq!(source.emit(Err(MapError::Timeout("15s".into()))), 1);

        let received = first.updates.recv().await.unwrap();
        assert!(matches!(received, Err(MapError::Timeout(_))));
        assert_eq!(source.cleared_watches(), vec![second.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_delivers_in_order() {
        let source = Arc::new(SimulatedPositionSource::new());
        let options = PositionOptions::high_accuracy(Duration::from_secs(15), Duration::ZERO);
        let mut watch = source.watch_position(options);

        let handle = source.spawn_replay(vec![
            ScriptedReading::new(Duration::from_secs(1), Ok(PositionFix::new(0.0, 0.0, 20.0))),
            ScriptedReading::new(Duration::from_secs(1), Ok(PositionFix::new(0.0, 0.0, 9.0))),
        ]);
        handle.await.unwrap();

        assert_eq!(watch.updates.recv().await.unwrap().unwrap().accuracy_m, 20.0);
        assert_eq!(watch.updates.recv().await.unwrap().unwrap().accuracy_m, 9.0);
    }
}
