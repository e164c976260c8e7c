#![forbid(unsafe_code)]

//! Property-based invariants for the host-driven event loop.
//!
//! 1. Fire count depends only on total elapsed time, not on how the host
//!    slices it into `advance` calls.
//! 2. After cancellation no further callbacks run.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use tourbind_reactive::{Duration, EventLoop};

fn arb_steps() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..500, 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn fire_count_is_independent_of_slicing(period in 1u64..300, steps in arb_steps()) {
        let ev = EventLoop::new();
        let hits = Rc::new(Cell::new(0u64));
        let hits_clone = Rc::clone(&hits);
        let _h = ev.set_interval(Duration::from_millis(period), move || {
            hits_clone.set(hits_clone.get() + 1);
        });

        let total: u64 = steps.iter().sum();
        for step in &steps {
            ev.advance(Duration::from_millis(*step));
        }
        prop_assert_eq!(hits.get(), total / period);
        prop_assert_eq!(ev.now(), Duration::from_millis(total));
    }

    #[test]
    fn cancelled_interval_stays_silent(period in 1u64..100, before in 0u64..1000, after in 0u64..1000) {
        let ev = EventLoop::new();
        let hits = Rc::new(Cell::new(0u64));
        let hits_clone = Rc::clone(&hits);
        let handle = ev.set_interval(Duration::from_millis(period), move || {
            hits_clone.set(hits_clone.get() + 1);
        });

        ev.advance(Duration::from_millis(before));
        let seen = hits.get();
        handle.cancel();
        ev.advance(Duration::from_millis(after));
        prop_assert_eq!(hits.get(), seen);
        prop_assert_eq!(ev.active_timers(), 0);
    }
}
