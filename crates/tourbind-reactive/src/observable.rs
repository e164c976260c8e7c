#![forbid(unsafe_code)]

//! Shared reactive cell with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] keeps its value in reference-counted storage
//! (`Rc<RefCell<..>>`). Writes that change the value (by `PartialEq`) bump
//! the version and notify every live subscriber in registration order.
//! Writes of an equal value are dropped silently, which is what lets a
//! mirror re-write a whole snapshot every tick without waking the UI for
//! fields that did not move.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: callbacks live as long as their [`Subscription`]
//!   guard. Dead entries are pruned lazily on the next notification.
//! - **Re-entrant writes**: a subscriber may write to the observable that
//!   notified it. The value borrow is released before callbacks run.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` yields another handle to the **same** cell.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing write.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Two handles are equal when they share the same cell.
impl<T> PartialEq for Observable<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a new observable. The initial version is 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Write a new value, notifying subscribers if it differs.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Write a new value and return the one it replaced.
    pub fn replace(&self, value: T) -> T {
        let previous = self.get();
        self.set(value);
        previous
    }

    /// Mutate in place. Subscribers are notified only if the value changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value != old {
                inner.version += 1;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Register a change callback.
    ///
    /// The callback stays registered while the returned guard is alive.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription::from_guard(Box::new(strong))
    }

    /// Version counter, bumped once per value-changing write.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn notify(&self) {
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .collect()
        };
        if callbacks.is_empty() {
            return;
        }

        if super::batch::is_batching() {
            for cb in callbacks {
                let key = Rc::as_ptr(&cb) as *const () as usize;
                let source = self.clone();
                super::batch::defer_or_run_keyed(key, move || {
                    let latest = source.get();
                    cb(&latest);
                });
            }
            return;
        }

        let value = self.get();
        tracing::trace!(subscribers = callbacks.len(), "observable notify");
        for cb in &callbacks {
            cb(&value);
        }
    }
}

/// RAII guard for a registered callback.
///
/// Dropping it detaches the callback. The same guard type is handed out
/// by engines for change watches, so anything that can be unsubscribed
/// by dropping fits here.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    /// Wrap any value whose drop ends the subscription.
    pub fn from_guard(guard: Box<dyn std::any::Any>) -> Self {
        Self { _guard: guard }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_set_basic() {
        let obs = Observable::new(42);
        assert_eq!(obs.get(), 42);
        assert_eq!(obs.version(), 0);

        obs.set(99);
        assert_eq!(obs.get(), 99);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn equal_write_is_dropped() {
        let obs = Observable::new(Some(3usize));
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let _sub = obs.subscribe(move |_| hits_clone.set(hits_clone.get() + 1));

        obs.set(Some(3));
        assert_eq!(obs.version(), 0);
        assert_eq!(hits.get(), 0);

        obs.set(None);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn replace_returns_previous() {
        let obs = Observable::new("a".to_string());
        assert_eq!(obs.replace("b".to_string()), "a");
        assert_eq!(obs.get(), "b");
    }

    #[test]
    fn update_notifies_once_on_change() {
        let obs = Observable::new(vec![1, 2]);
        let last_len = Rc::new(Cell::new(0usize));
        let last_clone = Rc::clone(&last_len);
        let _sub = obs.subscribe(move |v: &Vec<i32>| last_clone.set(v.len()));

        obs.update(|v| v.push(3));
        assert_eq!(last_len.get(), 3);
        obs.update(|_| {});
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let obs = Observable::new(0);
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let sub = obs.subscribe(move |_| count_clone.set(count_clone.get() + 1));

        obs.set(1);
        drop(sub);
        obs.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn clones_share_cell_and_compare_equal() {
        let a = Observable::new(0);
        let b = a.clone();
        b.set(5);
        assert_eq!(a.get(), 5);
        assert_eq!(a, b);
        assert_ne!(a, Observable::new(5));
    }

    #[test]
    fn subscriber_may_write_back() {
        let obs = Observable::new(0);
        let echo = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v == 1 {
                echo.set(2);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let log1 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_| log1.borrow_mut().push('A'));
        let log2 = Rc::clone(&log);
        let _s2 = obs.subscribe(move |_| log2.borrow_mut().push('B'));

        obs.set(1);
        assert_eq!(*log.borrow(), vec!['A', 'B']);
    }
}
