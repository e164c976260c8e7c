#![forbid(unsafe_code)]

//! Reactive projection of engine state.
//!
//! [`StateMirror`] copies an engine snapshot into [`TourFields`] whenever
//! its sync source ticks. Two sources satisfy the same contract: a polling
//! interval on the host [`EventLoop`], or the engine's own change watch.
//!
//! # Invariants
//!
//! 1. `stop()` is idempotent and safe before `start()`.
//! 2. No field is written after `stop()` returns, including by a tick that
//!    was already being delivered.
//! 3. A tick whose engine has been dropped is a no-op.
//! 4. `stop()` leaves the fields as they were; only `reset()` (or the
//!    engine's destroy notification) returns them to the baseline.
//! 5. One sync writes every field inside a single [`BatchScope`], so
//!    subscribers never observe a half-applied snapshot.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tourbind_dom::Element;
use tourbind_reactive::{BatchScope, Duration, EventLoop, IntervalHandle, Observable, Subscription};
use tracing::{debug, trace, warn};

use crate::config::{BridgeConfig, DEFAULT_POLL_INTERVAL_MS, SyncMode};
use crate::engine::{EngineState, SharedEngine, TourEngine};
use crate::step::DriveStep;

static NEXT_MIRROR_ID: AtomicU64 = AtomicU64::new(1);

/// Reactive fields consumed by the UI.
///
/// Cloning yields handles to the same cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourFields {
    pub is_active: Observable<bool>,
    pub has_next: Observable<bool>,
    pub has_previous: Observable<bool>,
    pub is_first: Observable<bool>,
    pub is_last: Observable<bool>,
    pub active_index: Observable<Option<usize>>,
    pub active_step: Observable<Option<DriveStep>>,
    pub previous_step: Observable<Option<DriveStep>>,
    pub active_element: Observable<Option<Element>>,
    pub previous_element: Observable<Option<Element>>,
    /// Raw engine state, for callers that want everything at once.
    pub state: Observable<EngineState>,
}

impl TourFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current values of every field.
    #[must_use]
    pub fn snapshot(&self) -> MirrorSnapshot {
        MirrorSnapshot {
            is_active: self.is_active.get(),
            has_next: self.has_next.get(),
            has_previous: self.has_previous.get(),
            is_first: self.is_first.get(),
            is_last: self.is_last.get(),
            state: self.state.get(),
        }
    }

    fn write(&self, snapshot: MirrorSnapshot) {
        let _batch = BatchScope::new();
        self.is_active.set(snapshot.is_active);
        self.has_next.set(snapshot.has_next);
        self.has_previous.set(snapshot.has_previous);
        self.is_first.set(snapshot.is_first);
        self.is_last.set(snapshot.is_last);
        self.active_index.set(snapshot.state.active_index);
        self.active_step.set(snapshot.state.active_step.clone());
        self.previous_step.set(snapshot.state.previous_step.clone());
        self.active_element.set(snapshot.state.active_element.clone());
        self.previous_element.set(snapshot.state.previous_element.clone());
        self.state.set(snapshot.state);
    }

    /// Return every field to the neutral baseline.
    pub fn reset(&self) {
        self.write(MirrorSnapshot::default());
    }

    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.snapshot() == MirrorSnapshot::default()
            && self.active_index.get().is_none()
            && self.active_step.get().is_none()
            && self.previous_step.get().is_none()
            && self.active_element.get().is_none()
            && self.previous_element.get().is_none()
    }
}

/// One consistent read of the engine. The default is the baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorSnapshot {
    pub is_active: bool,
    pub has_next: bool,
    pub has_previous: bool,
    pub is_first: bool,
    pub is_last: bool,
    pub state: EngineState,
}

impl MirrorSnapshot {
    pub fn read(engine: &dyn TourEngine) -> Self {
        Self {
            is_active: engine.is_active(),
            has_next: engine.has_next_step(),
            has_previous: engine.has_previous_step(),
            is_first: engine.is_first_step(),
            is_last: engine.is_last_step(),
            state: engine.state(),
        }
    }
}

/// How a mirror learns that the engine may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    Poll { interval: Duration },
    Push,
}

impl Default for SyncStrategy {
    fn default() -> Self {
        Self::Poll {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl SyncStrategy {
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        match config.sync {
            SyncMode::Poll => Self::Poll {
                interval: config.poll_interval(),
            },
            SyncMode::Push => Self::Push,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Poll { .. } => "poll",
            Self::Push => "push",
        }
    }

    /// Start delivering `tick`. Push falls back to default polling when the
    /// engine cannot report changes.
    fn attach(self, engine: &dyn TourEngine, event_loop: &EventLoop, tick: Rc<dyn Fn()>) -> SyncSource {
        match self {
            Self::Poll { interval } => {
                SyncSource::Interval(event_loop.set_interval(interval, move || tick()))
            }
            Self::Push => match engine.watch(Rc::clone(&tick)) {
                Some(subscription) => SyncSource::Watch(subscription),
                None => {
                    warn!(
                        strategy = "push",
                        fallback_ms = DEFAULT_POLL_INTERVAL_MS,
                        "engine cannot report changes; falling back to polling"
                    );
                    Self::default().attach(engine, event_loop, tick)
                }
            },
        }
    }
}

/// A running tick source.
#[derive(Debug)]
enum SyncSource {
    Interval(IntervalHandle),
    Watch(Subscription),
}

impl SyncSource {
    fn cancel(self) {
        match self {
            Self::Interval(handle) => {
                handle.cancel();
            }
            Self::Watch(subscription) => drop(subscription),
        }
    }
}

struct MirrorInner {
    id: u64,
    fields: TourFields,
    strategy: SyncStrategy,
    event_loop: EventLoop,
    engine: RefCell<Option<Weak<dyn TourEngine>>>,
    source: RefCell<Option<SyncSource>>,
    running: Cell<bool>,
    syncs: Cell<u64>,
}

impl MirrorInner {
    fn sync(&self) -> bool {
        if !self.running.get() {
            return false;
        }
        let engine = self.engine.borrow().as_ref().and_then(Weak::upgrade);
        let Some(engine) = engine else {
            trace!(mirror_id = self.id, "engine dropped; sync skipped");
            return false;
        };
        let snapshot = MirrorSnapshot::read(engine.as_ref());
        // Engine queries may have re-entered and stopped us.
        if !self.running.get() {
            return false;
        }
        self.fields.write(snapshot);
        self.syncs.set(self.syncs.get() + 1);
        true
    }

    fn stop(&self) -> bool {
        if !self.running.replace(false) {
            return false;
        }
        let source = self.source.borrow_mut().take();
        if let Some(source) = source {
            source.cancel();
        }
        debug!(mirror_id = self.id, "state mirror stopped");
        true
    }
}

/// Keeps [`TourFields`] in step with one engine instance.
///
/// Cloning yields another handle to the same mirror.
#[derive(Clone)]
pub struct StateMirror {
    inner: Rc<MirrorInner>,
}

impl std::fmt::Debug for StateMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMirror")
            .field("id", &self.inner.id)
            .field("strategy", &self.inner.strategy)
            .field("running", &self.inner.running.get())
            .field("syncs", &self.inner.syncs.get())
            .finish()
    }
}

impl PartialEq for StateMirror {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl StateMirror {
    #[must_use]
    pub fn new(fields: TourFields, strategy: SyncStrategy, event_loop: EventLoop) -> Self {
        Self {
            inner: Rc::new(MirrorInner {
                id: NEXT_MIRROR_ID.fetch_add(1, Ordering::Relaxed),
                fields,
                strategy,
                event_loop,
                engine: RefCell::new(None),
                source: RefCell::new(None),
                running: Cell::new(false),
                syncs: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn fields(&self) -> &TourFields {
        &self.inner.fields
    }

    #[must_use]
    pub fn strategy(&self) -> SyncStrategy {
        self.inner.strategy
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Number of syncs that wrote the fields.
    #[must_use]
    pub fn sync_count(&self) -> u64 {
        self.inner.syncs.get()
    }

    /// Begin mirroring `engine`, restarting if already running, and sync once.
    pub fn start(&self, engine: &SharedEngine) {
        self.inner.stop();
        *self.inner.engine.borrow_mut() = Some(Rc::downgrade(engine));
        self.inner.running.set(true);

        let weak = Rc::downgrade(&self.inner);
        let tick: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.sync();
            }
        });
        let source = self
            .inner
            .strategy
            .attach(engine.as_ref(), &self.inner.event_loop, tick);
        *self.inner.source.borrow_mut() = Some(source);
        debug!(
            mirror_id = self.inner.id,
            strategy = self.inner.strategy.label(),
            "state mirror started"
        );
        self.inner.sync();
    }

    /// Stop ticking. Returns `false` when the mirror was not running.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }

    /// Read the engine now. Returns whether the fields were written.
    pub fn sync(&self) -> bool {
        self.inner.sync()
    }

    pub fn reset(&self) {
        self.inner.fields.reset();
    }

    /// Destroy notification: stop, then return to the baseline.
    pub fn on_engine_destroyed(&self) {
        self.inner.stop();
        self.inner.fields.reset();
        debug!(mirror_id = self.inner.id, "state mirror reset after engine destroy");
    }
}

impl Drop for MirrorInner {
    fn drop(&mut self) {
        if let Some(source) = self.source.get_mut().take() {
            source.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::headless::HeadlessEngine;
    use crate::step::{Popover, ResolvedTarget};
    use std::cell::Cell;

    fn engine_with_steps(n: usize) -> Rc<HeadlessEngine> {
        let engine = HeadlessEngine::shared(Element::new("body"));
        engine.set_config(EngineConfig {
            steps: (0..n)
                .map(|i| {
                    DriveStep::new(
                        ResolvedTarget::Element(Element::new("div")),
                        Popover::titled(format!("{i}")),
                    )
                })
                .collect(),
            ..EngineConfig::default()
        });
        engine
    }

    fn poll_mirror(ev: &EventLoop) -> StateMirror {
        StateMirror::new(TourFields::new(), SyncStrategy::default(), ev.clone())
    }

    #[test]
    fn poll_reflects_engine_on_cadence() {
        let ev = EventLoop::new();
        let engine = engine_with_steps(3);
        let shared: SharedEngine = engine.clone();
        let mirror = poll_mirror(&ev);
        mirror.start(&shared);

        engine.drive(0);
        assert!(!mirror.fields().is_active.get());
        ev.advance(Duration::from_millis(200));
        assert!(mirror.fields().is_active.get());
        assert!(mirror.fields().is_first.get());
        assert!(mirror.fields().has_next.get());

        engine.move_next();
        ev.advance(Duration::from_millis(199));
        assert_eq!(mirror.fields().active_index.get(), Some(0));
        ev.advance(Duration::from_millis(1));
        assert_eq!(mirror.fields().active_index.get(), Some(1));
        assert!(mirror.fields().has_previous.get());
    }

    #[test]
    fn stop_is_idempotent_and_freezes_fields() {
        let ev = EventLoop::new();
        let engine = engine_with_steps(2);
        let shared: SharedEngine = engine.clone();
        let mirror = poll_mirror(&ev);

        assert!(!mirror.stop());
        mirror.start(&shared);
        engine.drive(0);
        ev.advance(Duration::from_millis(200));
        let syncs = mirror.sync_count();

        assert!(mirror.stop());
        assert!(!mirror.stop());
        engine.move_next();
        ev.advance(Duration::from_millis(1000));
        assert_eq!(mirror.sync_count(), syncs);
        assert_eq!(mirror.fields().active_index.get(), Some(0));
        assert!(!mirror.sync());
        assert_eq!(ev.active_timers(), 0);
    }

    #[test]
    fn dropped_engine_makes_ticks_inert() {
        let ev = EventLoop::new();
        let mirror = poll_mirror(&ev);
        {
            let shared: SharedEngine = engine_with_steps(1);
            mirror.start(&shared);
        }
        let syncs = mirror.sync_count();
        ev.advance(Duration::from_millis(600));
        assert_eq!(mirror.sync_count(), syncs);
    }

    #[test]
    fn push_syncs_on_every_change() {
        let ev = EventLoop::new();
        let engine = engine_with_steps(2);
        let shared: SharedEngine = engine.clone();
        let mirror = StateMirror::new(TourFields::new(), SyncStrategy::Push, ev.clone());
        mirror.start(&shared);
        assert_eq!(ev.active_timers(), 0);

        engine.drive(0);
        assert_eq!(mirror.fields().active_index.get(), Some(0));
        engine.move_next();
        assert!(mirror.fields().is_last.get());
    }

    #[test]
    fn destroy_notification_resets_fields() {
        let ev = EventLoop::new();
        let engine = engine_with_steps(2);
        let shared: SharedEngine = engine.clone();
        let mirror = StateMirror::new(TourFields::new(), SyncStrategy::Push, ev);
        mirror.start(&shared);
        engine.drive(1);
        assert!(!mirror.fields().is_baseline());

        mirror.on_engine_destroyed();
        assert!(mirror.fields().is_baseline());
        assert!(!mirror.is_running());
    }

    #[test]
    fn one_sync_notifies_each_subscriber_once() {
        let ev = EventLoop::new();
        let engine = engine_with_steps(3);
        let shared: SharedEngine = engine.clone();
        let mirror = poll_mirror(&ev);
        let seen = Rc::new(Cell::new(0u32));
        let seen_clone = Rc::clone(&seen);
        let _sub = mirror
            .fields()
            .state
            .subscribe(move |_| seen_clone.set(seen_clone.get() + 1));

        mirror.start(&shared);
        engine.drive(0);
        engine.move_next();
        mirror.sync();
        assert_eq!(seen.get(), 1);
    }
}
