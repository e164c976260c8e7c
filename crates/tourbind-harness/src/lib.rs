#![forbid(unsafe_code)]

//! Test fixtures for tourbind.
//!
//! - [`RecordingEngine`] - scriptable engine with a call log
//! - [`RecordingFactory`] - engine factory that keeps what it builds
//! - [`capture_logs`] - run a closure under a capturing tracing subscriber

pub mod logs;
pub mod recording;

pub use logs::{CapturedEvent, CapturedLogs, LogCapture, capture_logs};
pub use recording::{DestroyMode, EngineCall, RecordingEngine, RecordingFactory, element_step};
