#![forbid(unsafe_code)]

//! Batch coalescing for [`Observable`](super::Observable) notifications.
//!
//! A state mirror writes ten or more fields per synchronisation. Without
//! batching, a subscriber watching two of them would run after the first
//! write and see a half-updated snapshot. Inside a [`BatchScope`] values are
//! written immediately but notifications are queued; when the outermost
//! scope drops, each distinct callback fires once with the latest value.
//!
//! # Invariants
//!
//! 1. Nested scopes are supported; only the outermost one flushes.
//! 2. `Observable::get()` inside a batch returns the latest value.
//! 3. Deferred callbacks fire in the order they were first queued.
//!
//! # Failure Modes
//!
//! - **Callback panics during flush**: the remaining callbacks still run and
//!   the first panic is re-raised afterwards.

use std::cell::RefCell;

type DeferredNotify = Box<dyn FnOnce()>;

struct DeferredEntry {
    key: Option<usize>,
    notify: DeferredNotify,
}

struct BatchContext {
    depth: u32,
    deferred: Vec<DeferredEntry>,
}

thread_local! {
    static BATCH_CTX: RefCell<Option<BatchContext>> = const { RefCell::new(None) };
}

/// Whether a batch is open on this thread.
pub fn is_batching() -> bool {
    BATCH_CTX.with(|ctx| ctx.borrow().is_some())
}

/// Queue `f` for the end of the current batch, or run it now.
///
/// Returns `true` if the call was deferred.
pub fn defer_or_run(f: impl FnOnce() + 'static) -> bool {
    BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        if let Some(ref mut batch) = *guard {
            batch.deferred.push(DeferredEntry {
                key: None,
                notify: Box::new(f),
            });
            true
        } else {
            drop(guard);
            f();
            false
        }
    })
}

/// Like [`defer_or_run`], but a later call with the same `key` replaces the
/// queued callback while keeping its original position.
pub fn defer_or_run_keyed(key: usize, f: impl FnOnce() + 'static) -> bool {
    BATCH_CTX.with(|ctx| {
        let mut guard = ctx.borrow_mut();
        if let Some(ref mut batch) = *guard {
            if let Some(entry) = batch
                .deferred
                .iter_mut()
                .find(|entry| entry.key == Some(key))
            {
                entry.notify = Box::new(f);
            } else {
                batch.deferred.push(DeferredEntry {
                    key: Some(key),
                    notify: Box::new(f),
                });
            }
            true
        } else {
            drop(guard);
            f();
            false
        }
    })
}

fn flush(deferred: Vec<DeferredEntry>) {
    if deferred.is_empty() {
        return;
    }
    tracing::trace!(callbacks = deferred.len(), "batch flush");

    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    for entry in deferred {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(entry.notify));
        if let Err(payload) = result
            && first_panic.is_none()
        {
            first_panic = Some(payload);
        }
    }
    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
}

/// RAII guard opening a batch scope.
pub struct BatchScope {
    is_root: bool,
}

impl BatchScope {
    /// Open a batch, or deepen the one already open.
    #[must_use]
    pub fn new() -> Self {
        let is_root = BATCH_CTX.with(|ctx| {
            let mut guard = ctx.borrow_mut();
            match *guard {
                Some(ref mut batch) => {
                    batch.depth += 1;
                    false
                }
                None => {
                    *guard = Some(BatchContext {
                        depth: 1,
                        deferred: Vec::new(),
                    });
                    true
                }
            }
        });
        Self { is_root }
    }

    /// Callbacks currently queued.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        BATCH_CTX.with(|ctx| ctx.borrow().as_ref().map_or(0, |b| b.deferred.len()))
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        let should_flush = BATCH_CTX.with(|ctx| match *ctx.borrow_mut() {
            Some(ref mut batch) => {
                batch.depth -= 1;
                batch.depth == 0
            }
            None => false,
        });
        if should_flush {
            // Detach the context first so writes made by flushed callbacks
            // notify directly instead of queueing into a dead batch.
            let batch = BATCH_CTX.with(|ctx| ctx.borrow_mut().take());
            if let Some(batch) = batch {
                flush(batch.deferred);
            }
        }
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("is_root", &self.is_root)
            .field("pending", &self.pending_count())
            .finish()
    }
}
