#![forbid(unsafe_code)]

//! Reactive primitives for tourbind.
//!
//! Everything here is single-threaded (`Rc`, `RefCell`, thread-locals). The
//! host UI drives time and rendering from one thread; these types are the
//! "reactive read/write cell" and "timer" hooks the tour bridge consumes.
//!
//! - [`Observable`] - shared value cell with change notification
//! - [`BatchScope`] - coalesces notifications across several writes
//! - [`EventLoop`] - host-driven interval timers

pub mod batch;
pub mod observable;
pub mod timer;

pub use batch::BatchScope;
pub use observable::{Observable, Subscription};
pub use timer::{EventLoop, IntervalHandle, TimerId};
pub use web_time::Duration;
