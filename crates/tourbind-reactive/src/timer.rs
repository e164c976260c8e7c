#![forbid(unsafe_code)]

//! Host-driven interval timers for a single-threaded event loop.
//!
//! The loop never sleeps and never spawns threads. The embedding host owns
//! the clock and calls [`EventLoop::advance`]; every interval whose deadline
//! falls inside the advanced window fires, in deadline order, before
//! `advance` returns. This keeps timer callbacks on the UI thread and makes
//! tests fully deterministic.
//!
//! # Invariants
//!
//! 1. A cancelled interval never fires again, even if it was due in the
//!    window currently being processed.
//! 2. Callbacks may register or cancel intervals re-entrantly.
//! 3. Intervals due at the same instant fire in registration order.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use web_time::Duration;

/// Shortest accepted period. Zero periods are clamped to this.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Identifier of a registered interval.
pub type TimerId = u64;

type TimerCallback = Rc<dyn Fn()>;

struct TimerEntry {
    id: TimerId,
    period: Duration,
    due: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct LoopInner {
    now: Duration,
    next_id: TimerId,
    timers: Vec<TimerEntry>,
}

/// Deterministic timer queue driven by the host.
///
/// Cloning yields another handle to the same loop.
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventLoop")
            .field("now", &inner.now)
            .field("timers", &inner.timers.len())
            .finish()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current loop time, measured from loop creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of live intervals.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Register `callback` to run every `period`, first at `now + period`.
    pub fn set_interval(&self, period: Duration, callback: impl Fn() + 'static) -> IntervalHandle {
        let period = period.max(MIN_PERIOD);
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        let due = inner.now + period;
        inner.timers.push(TimerEntry {
            id,
            period,
            due,
            callback: Rc::new(callback),
        });
        tracing::trace!(timer_id = id, period_ms = period.as_millis() as u64, "interval registered");
        IntervalHandle {
            id,
            owner: Rc::downgrade(&self.inner),
        }
    }

    /// Move the clock forward by `dt`, firing every interval that comes due.
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, dt: Duration) -> usize {
        let target = self.now() + dt;
        let mut fired = 0;
        while let Some(callback) = self.take_next_due(target) {
            callback();
            fired += 1;
        }
        self.inner.borrow_mut().now = target;
        fired
    }

    fn take_next_due(&self, target: Duration) -> Option<TimerCallback> {
        let mut inner = self.inner.borrow_mut();
        // Earliest deadline first; position breaks ties (registration order).
        let (pos, due) = inner
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(pos, t)| (t.due, *pos))
            .map(|(pos, t)| (pos, t.due))?;
        inner.now = due;
        let entry = &mut inner.timers[pos];
        entry.due += entry.period;
        Some(Rc::clone(&entry.callback))
    }
}

fn cancel_in(inner: &RefCell<LoopInner>, id: TimerId) -> bool {
    let mut inner = inner.borrow_mut();
    let before = inner.timers.len();
    inner.timers.retain(|t| t.id != id);
    before != inner.timers.len()
}

/// Handle to a registered interval.
///
/// Dropping the handle does **not** cancel the interval; call
/// [`cancel`](Self::cancel) explicitly.
#[derive(Debug, Clone)]
pub struct IntervalHandle {
    id: TimerId,
    owner: Weak<RefCell<LoopInner>>,
}

impl IntervalHandle {
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Whether the interval is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|inner| inner.borrow().timers.iter().any(|t| t.id == self.id))
    }

    /// Cancel the interval. Returns `false` if it was already gone.
    pub fn cancel(&self) -> bool {
        match self.owner.upgrade() {
            Some(inner) => {
                let removed = cancel_in(&inner, self.id);
                if removed {
                    tracing::trace!(timer_id = self.id, "interval cancelled");
                }
                removed
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        (hits, move || hits_clone.set(hits_clone.get() + 1))
    }

    #[test]
    fn interval_fires_at_cadence() {
        let ev = EventLoop::new();
        let (hits, tick) = counter();
        let _h = ev.set_interval(Duration::from_millis(200), tick);

        assert_eq!(ev.advance(Duration::from_millis(199)), 0);
        assert_eq!(ev.advance(Duration::from_millis(1)), 1);
        ev.advance(Duration::from_millis(1000));
        assert_eq!(hits.get(), 6);
        assert_eq!(ev.now(), Duration::from_millis(1200));
    }

    #[test]
    fn cancel_is_idempotent() {
        let ev = EventLoop::new();
        let (hits, tick) = counter();
        let handle = ev.set_interval(Duration::from_millis(10), tick);

        assert!(handle.is_active());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        ev.advance(Duration::from_millis(100));
        assert_eq!(hits.get(), 0);
        assert_eq!(ev.active_timers(), 0);
    }

    #[test]
    fn callback_can_cancel_itself() {
        let ev = EventLoop::new();
        let hits = Rc::new(Cell::new(0u32));
        let slot: Rc<RefCell<Option<IntervalHandle>>> = Rc::new(RefCell::new(None));

        let hits_clone = Rc::clone(&hits);
        let slot_clone = Rc::clone(&slot);
        let handle = ev.set_interval(Duration::from_millis(5), move || {
            hits_clone.set(hits_clone.get() + 1);
            if let Some(h) = slot_clone.borrow().as_ref() {
                h.cancel();
            }
        });
        *slot.borrow_mut() = Some(handle);

        ev.advance(Duration::from_millis(50));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn callback_cancelling_a_peer_due_in_same_window() {
        let ev = EventLoop::new();
        let (peer_hits, peer_tick) = counter();
        let peer = ev.set_interval(Duration::from_millis(10), peer_tick);
        // Registered second, so it fires after `peer` at t=10 but before it at t=20.
        let _killer = ev.set_interval(Duration::from_millis(10), move || {
            peer.cancel();
        });

        ev.advance(Duration::from_millis(30));
        assert_eq!(peer_hits.get(), 1);
    }

    #[test]
    fn zero_period_is_clamped() {
        let ev = EventLoop::new();
        let (hits, tick) = counter();
        let _h = ev.set_interval(Duration::ZERO, tick);
        ev.advance(Duration::from_millis(3));
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn handle_outliving_loop_is_inert() {
        let handle = {
            let ev = EventLoop::new();
            ev.set_interval(Duration::from_millis(1), || {})
        };
        assert!(!handle.is_active());
        assert!(!handle.cancel());
    }
}
