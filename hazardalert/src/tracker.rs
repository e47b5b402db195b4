//! Current position and its freshness.
//!
//! [`PositionTracker`] holds the latest position fix. Fixes arrive from
//! one-shot requests ([`PositionTracker::request_once`]) and from a
//! continuous watch ([`PositionTracker::start_watch`]). Both go through the
//! same update path and whichever completes last wins; neither kind of
//! update has priority over the other.
//!
//! ```
//! use hazardalert::tracker::TrackerState;
//!
//! let state = TrackerState::default();
//! assert!(state.fix.is_none());
//! assert!(!state.is_stale(1_000, 30));
//! ```
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::{sync::watch, task::JoinHandle};
#[cfg(feature = "tracing")]
use tracing::{debug, instrument, warn};

use crate::{
    coord::Coordinate,
    error::LocationError,
    source::{Clock, LocationSource},
};

/// Seconds after which the position is shown as stale.
pub const DEFAULT_STALE_SECS: u64 = 30;

/// A position reported by the location source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// Where the device is.
    pub coordinate: Coordinate,
    /// Estimated accuracy radius (meters), if reported.
    pub accuracy_meters: Option<f64>,
    /// When the source captured the fix (Unix millis).
    pub captured_at_ms: i64,
}

impl PositionFix {
    /// A fix without accuracy information.
    #[must_use]
    pub const fn new(coordinate: Coordinate, captured_at_ms: i64) -> Self {
        Self {
            coordinate,
            accuracy_meters: None,
            captured_at_ms,
        }
    }
}

/// Snapshot of what the tracker knows.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerState {
    /// Latest fix, if any has arrived.
    pub fix: Option<PositionFix>,
    /// Failure of the latest one-shot request, cleared by the next success.
    pub last_error: Option<LocationError>,
    /// Local time the latest fix was received (Unix millis).
    pub last_updated_at_ms: Option<i64>,
    /// One-shot requests still waiting on the source.
    pub pending_requests: u32,
}

impl TrackerState {
    /// Whether more than `window_secs` have passed since the last fix was
    /// received. Never stale before the first fix.
    #[must_use]
    pub fn is_stale(&self, now_ms: i64, window_secs: u64) -> bool {
        let window_ms = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);

        self.last_updated_at_ms
            .map_or(false, |updated| now_ms.saturating_sub(updated) > window_ms)
    }

    /// Whole seconds since the last fix was received, clamped at zero.
    #[must_use]
    pub fn seconds_since_update(&self, now_ms: i64) -> Option<u64> {
        self.last_updated_at_ms
            .map(|updated| u64::try_from(now_ms.saturating_sub(updated) / 1000).unwrap_or(0))
    }

    /// Whether a one-shot request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending_requests > 0
    }
}

#[derive(Debug, Default)]
struct WatchSlot {
    /// Bumped on every start and stop. A watch task may only write while
    /// the generation it was started with is current.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    state: watch::Sender<TrackerState>,
    clock: Arc<dyn Clock>,
    watch: Mutex<WatchSlot>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, WatchSlot> {
        self.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The only place a fix enters the state.
    fn apply(&self, fix: PositionFix, clear_error: bool) {
        let received_at = self.clock.now_ms();

        self.state.send_modify(|state| {
            state.fix = Some(fix);
            state.last_updated_at_ms = Some(received_at);
            if clear_error {
                state.last_error = None;
            }
        });
    }

    /// Apply a fix from the watch started as `generation`, unless that
    /// watch has been stopped or replaced.
    fn apply_watched(&self, generation: u64, fix: PositionFix) -> bool {
        let slot = self.slot();

        if slot.generation != generation || slot.task.is_none() {
            return false;
        }

        self.apply(fix, false);
        drop(slot);
        true
    }
}

/// Counts a one-shot request as pending until dropped, including when the
/// request future is dropped before it completes.
struct PendingRequest<'a>(&'a watch::Sender<TrackerState>);

impl<'a> PendingRequest<'a> {
    fn start(state: &'a watch::Sender<TrackerState>) -> Self {
        state.send_modify(|state| state.pending_requests += 1);
        Self(state)
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|state| {
            state.pending_requests = state.pending_requests.saturating_sub(1);
        });
    }
}

/// Owner of the current position fix.
pub struct PositionTracker {
    source: Arc<dyn LocationSource>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PositionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionTracker")
            .field("state", &*self.shared.state.borrow())
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

impl PositionTracker {
    /// Create a tracker with no fix.
    #[must_use]
    pub fn new(source: Arc<dyn LocationSource>, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(TrackerState::default());

        Self {
            source,
            shared: Arc::new(Shared {
                state,
                clock,
                watch: Mutex::default(),
            }),
        }
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> TrackerState {
        *self.shared.state.borrow()
    }

    /// The latest fix.
    #[must_use]
    pub fn current_fix(&self) -> Option<PositionFix> {
        self.shared.state.borrow().fix
    }

    /// Receive every state change from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.shared.state.subscribe()
    }

    /// See [`TrackerState::is_stale`].
    #[must_use]
    pub fn is_stale(&self, now_ms: i64, window_secs: u64) -> bool {
        self.snapshot().is_stale(now_ms, window_secs)
    }

    /// Ask the source for a single fix.
    ///
    /// On success the fix replaces the current one and any previous error is
    /// cleared. On failure the previous fix is kept and the error is recorded.
    /// Errors are never returned; read them from [`Self::snapshot`].
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use futures::{future::{self, BoxFuture}, stream::{self, BoxStream}, FutureExt, StreamExt};
    /// use hazardalert::{
    ///     source::{LocationSource, SystemClock},
    ///     Coordinate, LocationError, PositionFix, PositionTracker,
    /// };
    ///
    /// struct Parked(PositionFix);
    ///
    /// impl LocationSource for Parked {
    ///     fn current_position(&self) -> BoxFuture<'static, Result<PositionFix, LocationError>> {
    ///         future::ready(Ok(self.0)).boxed()
    ///     }
    ///
    ///     fn watch_position(&self) -> BoxStream<'static, Result<PositionFix, LocationError>> {
    ///         stream::empty().boxed()
    ///     }
    /// }
    ///
    /// let here = PositionFix::new(Coordinate::new(37.1788597, 138.9253202), 0);
    /// let tracker = PositionTracker::new(Arc::new(Parked(here)), Arc::new(SystemClock));
    ///
    /// tokio_test::block_on(tracker.request_once());
    ///
    /// let state = tracker.snapshot();
    /// assert_eq!(state.fix, Some(here));
    /// assert!(state.last_updated_at_ms.is_some());
    /// assert!(!state.is_loading());
    /// ```
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn request_once(&self) {
        let _pending = PendingRequest::start(&self.shared.state);

        let result = self.source.current_position().await;

        match result {
            Ok(fix) => {
                #[cfg(feature = "tracing")]
                debug!(coordinate = ?fix.coordinate, "fix received");

                self.shared.apply(fix, true);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                warn!(error = %e, "position request failed");

                self.shared
                    .state
                    .send_modify(|state| state.last_error = Some(e));
            }
        }
    }

    /// Whether a watch is active.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.shared.slot().task.is_some()
    }

    /// Follow the source's continuous fixes, replacing any earlier watch.
    ///
    /// Errors on the stream are logged and otherwise ignored; they do not
    /// touch [`TrackerState::last_error`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_watch(&self) {
        let mut slot = self.shared.slot();

        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.generation += 1;

        let generation = slot.generation;
        let shared = Arc::clone(&self.shared);
        let mut fixes = self.source.watch_position();

        slot.task = Some(tokio::spawn(async move {
            #[cfg(feature = "tracing")]
            debug!(generation, "watch started");

            while let Some(res) = fixes.next().await {
                match res {
                    Ok(fix) => {
                        if !shared.apply_watched(generation, fix) {
                            break;
                        }
                    }
                    #[cfg(feature = "tracing")]
                    Err(e) => warn!(error = %e, "watch error dropped"),
                    #[cfg(not(feature = "tracing"))]
                    Err(_) => {}
                }
            }
        }));
    }

    /// Stop the active watch. Once this returns, the stopped watch never
    /// changes the state again. Returns whether a watch was active.
    pub fn stop_watch(&self) -> bool {
        let mut slot = self.shared.slot();
        slot.generation += 1;

        slot.task.take().map_or(false, |task| {
            task.abort();

            #[cfg(feature = "tracing")]
            debug!("watch stopped");

            true
        })
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        self.stop_watch();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc, Mutex,
        },
    };

    use futures::{
        channel::mpsc,
        future::{self, BoxFuture},
        stream::BoxStream,
        FutureExt, StreamExt,
    };

    use super::{PositionFix, PositionTracker, TrackerState};
    use crate::{
        coord::Coordinate,
        error::LocationError,
        source::{Clock, LocationSource},
    };

    type FixResult = Result<PositionFix, LocationError>;

    #[derive(Debug, Default)]
    pub(crate) struct FakeClock(AtomicI64);

    impl FakeClock {
        pub(crate) fn at(ms: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(ms)))
        }

        pub(crate) fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Replays queued one-shot results and fans emitted fixes out to every
    /// open watch.
    #[derive(Debug, Default)]
    pub(crate) struct FakeLocation {
        once: Mutex<VecDeque<FixResult>>,
        watchers: Mutex<Vec<mpsc::UnboundedSender<FixResult>>>,
    }

    impl FakeLocation {
        pub(crate) fn queue(&self, res: FixResult) {
            self.once.lock().unwrap().push_back(res);
        }

        pub(crate) fn emit(&self, res: FixResult) {
            for tx in self.watchers.lock().unwrap().iter() {
                let _ = tx.unbounded_send(res);
            }
        }

        pub(crate) fn open_watches(&self) -> usize {
            self.watchers
                .lock()
                .unwrap()
                .iter()
                .filter(|tx| !tx.is_closed())
                .count()
        }
    }

    impl LocationSource for FakeLocation {
        fn current_position(&self) -> BoxFuture<'static, FixResult> {
            let res = self
                .once
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LocationError::PositionUnavailable));
            future::ready(res).boxed()
        }

        fn watch_position(&self) -> BoxStream<'static, FixResult> {
            let (tx, rx) = mpsc::unbounded();
            self.watchers.lock().unwrap().push(tx);
            rx.boxed()
        }
    }

    pub(crate) fn fix(lat: f64, lon: f64) -> PositionFix {
        PositionFix::new(Coordinate::new(lat, lon), 1_000)
    }

    fn tracker(clock: &Arc<FakeClock>) -> (Arc<FakeLocation>, PositionTracker) {
        let source = Arc::new(FakeLocation::default());
        let tracker = PositionTracker::new(source.clone(), clock.clone());
        (source, tracker)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn request_once_records_receipt_time() {
        let clock = FakeClock::at(5_000);
        let (source, tracker) = tracker(&clock);
        source.queue(Ok(fix(37.18, 138.93)));

        tracker.request_once().await;

        let state = tracker.snapshot();
        assert_eq!(state.fix, Some(fix(37.18, 138.93)));
        assert_eq!(state.last_updated_at_ms, Some(5_000));
        assert_eq!(state.last_error, None);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn failure_keeps_previous_fix() {
        let clock = FakeClock::at(5_000);
        let (source, tracker) = tracker(&clock);
        source.queue(Ok(fix(37.18, 138.93)));
        source.queue(Err(LocationError::Timeout));
        source.queue(Ok(fix(37.19, 138.94)));

        tracker.request_once().await;
        clock.advance(1_000);
        tracker.request_once().await;

        let state = tracker.snapshot();
        assert_eq!(state.fix, Some(fix(37.18, 138.93)));
        assert_eq!(state.last_error, Some(LocationError::Timeout));
        assert_eq!(state.last_updated_at_ms, Some(5_000));

        tracker.request_once().await;
        let state = tracker.snapshot();
        assert_eq!(state.fix, Some(fix(37.19, 138.94)));
        assert_eq!(state.last_error, None);
        assert_eq!(state.last_updated_at_ms, Some(6_000));
    }

    /// Never answers one-shot requests.
    struct Unanswered;

    impl LocationSource for Unanswered {
        fn current_position(&self) -> BoxFuture<'static, FixResult> {
            future::pending().boxed()
        }

        fn watch_position(&self) -> BoxStream<'static, FixResult> {
            futures::stream::pending().boxed()
        }
    }

    #[tokio::test]
    async fn abandoned_request_stops_loading() {
        let tracker = PositionTracker::new(Arc::new(Unanswered), FakeClock::at(0));

        let mut request = Box::pin(tracker.request_once());
        assert!(futures::poll!(&mut request).is_pending());
        assert!(tracker.snapshot().is_loading());

        drop(request);
        let state = tracker.snapshot();
        assert!(!state.is_loading());
        assert_eq!(state, TrackerState::default());
    }

    #[tokio::test]
    async fn failure_without_fix() {
        let clock = FakeClock::at(0);
        let (source, tracker) = tracker(&clock);
        source.queue(Err(LocationError::PermissionDenied));

        tracker.request_once().await;

        let state = tracker.snapshot();
        assert_eq!(state.fix, None);
        assert_eq!(state.last_error, Some(LocationError::PermissionDenied));
        assert_eq!(state.last_updated_at_ms, None);
    }

    #[tokio::test]
    async fn watch_updates_state() {
        let clock = FakeClock::at(10_000);
        let (source, tracker) = tracker(&clock);
        let mut rx = tracker.subscribe();

        tracker.start_watch();
        assert!(tracker.is_watching());
        settle().await;

        source.emit(Ok(fix(37.18, 138.93)));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().fix, Some(fix(37.18, 138.93)));
        assert_eq!(rx.borrow().last_updated_at_ms, Some(10_000));

        clock.advance(2_000);
        source.emit(Ok(fix(37.2, 138.95)));
        rx.changed().await.unwrap();
        assert_eq!(tracker.current_fix(), Some(fix(37.2, 138.95)));
        assert_eq!(tracker.snapshot().last_updated_at_ms, Some(12_000));
    }

    #[tokio::test]
    async fn watch_errors_are_dropped() {
        let clock = FakeClock::at(0);
        let (source, tracker) = tracker(&clock);

        tracker.start_watch();
        settle().await;
        source.emit(Err(LocationError::PositionUnavailable));
        settle().await;

        assert_eq!(tracker.snapshot(), TrackerState::default());
        assert!(tracker.is_watching());
    }

    #[tokio::test]
    async fn stopped_watch_never_writes() {
        let clock = FakeClock::at(0);
        let (source, tracker) = tracker(&clock);
        let mut rx = tracker.subscribe();

        tracker.start_watch();
        settle().await;
        source.emit(Ok(fix(1., 1.)));
        rx.changed().await.unwrap();

        assert!(tracker.stop_watch());
        assert!(!tracker.stop_watch());
        source.emit(Ok(fix(2., 2.)));
        settle().await;

        assert_eq!(tracker.current_fix(), Some(fix(1., 1.)));
        assert_eq!(source.open_watches(), 0);
    }

    #[tokio::test]
    async fn restarting_replaces_watch() {
        let clock = FakeClock::at(0);
        let (source, tracker) = tracker(&clock);

        tracker.start_watch();
        tracker.start_watch();
        settle().await;

        assert_eq!(source.open_watches(), 1);
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let clock = FakeClock::at(0);
        let (source, tracker) = tracker(&clock);

        tracker.start_watch();
        settle().await;
        assert_eq!(source.open_watches(), 1);

        drop(tracker);
        settle().await;
        assert_eq!(source.open_watches(), 0);
    }

    #[tokio::test]
    async fn latest_write_wins() {
        let clock = FakeClock::at(0);
        let (source, tracker) = tracker(&clock);
        let mut rx = tracker.subscribe();

        tracker.start_watch();
        settle().await;

        source.queue(Ok(fix(1., 1.)));
        tracker.request_once().await;
        assert_eq!(tracker.current_fix(), Some(fix(1., 1.)));

        source.emit(Ok(fix(2., 2.)));
        rx.borrow_and_update();
        rx.changed().await.unwrap();
        assert_eq!(tracker.current_fix(), Some(fix(2., 2.)));

        source.queue(Ok(fix(3., 3.)));
        tracker.request_once().await;
        assert_eq!(tracker.current_fix(), Some(fix(3., 3.)));
    }

    #[tokio::test]
    async fn staleness() {
        let clock = FakeClock::at(100_000);
        let (source, tracker) = tracker(&clock);

        assert!(!tracker.is_stale(clock.now_ms(), 30));

        source.queue(Ok(fix(37.18, 138.93)));
        tracker.request_once().await;
        assert!(!tracker.is_stale(clock.now_ms(), 30));

        clock.advance(30_000);
        assert!(!tracker.is_stale(clock.now_ms(), 30));
        assert_eq!(tracker.snapshot().seconds_since_update(clock.now_ms()), Some(30));

        clock.advance(1);
        assert!(tracker.is_stale(clock.now_ms(), 30));
    }

    #[test]
    fn seconds_since_update_clamps() {
        let state = TrackerState {
            last_updated_at_ms: Some(10_000),
            ..TrackerState::default()
        };

        assert_eq!(state.seconds_since_update(9_000), Some(0));
        assert_eq!(state.seconds_since_update(12_999), Some(2));
        assert_eq!(TrackerState::default().seconds_since_update(0), None);
    }
}
