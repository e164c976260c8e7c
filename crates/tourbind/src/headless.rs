#![forbid(unsafe_code)]

//! In-memory engine over a `tourbind-dom` document.
//!
//! Implements the whole capability set without drawing anything: selector
//! targets are looked up in the document when their step becomes active,
//! moving past the last step ends the tour, and every state change bumps a
//! revision counter that backs [`TourEngine::watch`].

use std::cell::RefCell;
use std::rc::Rc;

use tourbind_dom::Element;
use tourbind_reactive::{Observable, Subscription};
use tracing::{debug, trace};

use crate::config::TourConfig;
use crate::engine::{DestroyHook, DestroyedEvent, EngineConfig, EngineState, TourEngine};
use crate::error::EngineError;
use crate::step::{DriveStep, ResolvedTarget};

#[derive(Default)]
struct Inner {
    steps: Vec<DriveStep>,
    tour: TourConfig,
    on_destroyed: Option<DestroyHook>,
    state: EngineState,
}

pub struct HeadlessEngine {
    document: Element,
    inner: RefCell<Inner>,
    revision: Observable<u64>,
}

impl std::fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("HeadlessEngine")
            .field("steps", &inner.steps.len())
            .field("active_index", &inner.state.active_index)
            .field("revision", &self.revision.get())
            .finish()
    }
}

impl HeadlessEngine {
    #[must_use]
    pub fn new(document: Element) -> Self {
        Self {
            document,
            inner: RefCell::new(Inner::default()),
            revision: Observable::new(0),
        }
    }

    /// Convenience for `Rc<dyn TourEngine>` call sites.
    #[must_use]
    pub fn shared(document: Element) -> Rc<Self> {
        Rc::new(Self::new(document))
    }

    /// Number of state changes so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Display options of the current configuration.
    #[must_use]
    pub fn tour_config(&self) -> TourConfig {
        self.inner.borrow().tour.clone()
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.inner.borrow().steps.len()
    }

    /// Progress line for the active step, when progress is shown. A step's
    /// own `showProgress` overrides the tour-wide setting.
    #[must_use]
    pub fn progress(&self) -> Option<String> {
        let inner = self.inner.borrow();
        let index = inner.state.active_index?;
        let show = inner
            .state
            .active_step
            .as_ref()
            .and_then(|step| step.popover.show_progress)
            .unwrap_or(inner.tour.show_progress);
        show.then(|| inner.tour.progress_label(index, inner.steps.len()))
    }

    fn lookup(&self, step: &DriveStep) -> Option<Element> {
        match step.target.as_ref()? {
            ResolvedTarget::Element(el) => Some(el.clone()),
            ResolvedTarget::Selector(selector) => match self.document.query_selector(selector) {
                Ok(found) => found,
                Err(err) => {
                    debug!(%selector, error = %err, "step selector rejected");
                    None
                }
            },
        }
    }

    fn bump(&self) {
        self.revision.update(|r| *r += 1);
    }

    /// Activate `index`, which must be in range.
    fn activate(&self, index: usize) {
        let step = {
            let inner = self.inner.borrow();
            match inner.steps.get(index) {
                Some(step) => step.clone(),
                None => return,
            }
        };
        let element = self.lookup(&step);
        {
            let mut inner = self.inner.borrow_mut();
            let state = &mut inner.state;
            state.previous_step = state.active_step.take();
            state.previous_element = state.active_element.take();
            state.is_initialized = true;
            state.active_index = Some(index);
            state.active_step = Some(step);
            state.active_element = element;
        }
        trace!(step_index = index, "step activated");
        self.bump();
    }

    fn finish(&self) -> Result<(), EngineError> {
        let (event, hook) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.is_initialized {
                return Ok(());
            }
            let state = std::mem::take(&mut inner.state);
            let event = DestroyedEvent {
                step: state.active_step,
                element: state.active_element,
            };
            (event, inner.on_destroyed.clone())
        };
        debug!("headless tour destroyed");
        self.bump();
        // Borrows are released; the hook may call back into the engine.
        if let Some(hook) = hook {
            hook.fire(&event);
        }
        Ok(())
    }
}

impl TourEngine for HeadlessEngine {
    fn set_config(&self, config: EngineConfig) {
        let mut inner = self.inner.borrow_mut();
        debug!(steps = config.steps.len(), "headless engine configured");
        inner.steps = config.steps;
        inner.tour = config.tour;
        inner.on_destroyed = config.on_destroyed;
    }

    fn drive(&self, step_index: usize) {
        let len = self.step_count();
        if step_index >= len {
            debug!(step_index, steps = len, "drive index out of range");
            // Ending a tour that never started is a no-op.
            let _ = self.finish();
            return;
        }
        self.activate(step_index);
    }

    fn highlight(&self, step: DriveStep) {
        let element = self.lookup(&step);
        {
            let mut inner = self.inner.borrow_mut();
            let state = &mut inner.state;
            state.previous_step = state.active_step.take();
            state.previous_element = state.active_element.take();
            state.is_initialized = true;
            state.active_index = None;
            state.active_step = Some(step);
            state.active_element = element;
        }
        self.bump();
    }

    fn destroy(&self) -> Result<(), EngineError> {
        self.finish()
    }

    fn refresh(&self) {
        let step = self.inner.borrow().state.active_step.clone();
        let Some(step) = step else {
            return;
        };
        let element = self.lookup(&step);
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let changed = inner.state.active_element != element;
            inner.state.active_element = element;
            changed
        };
        if changed {
            self.bump();
        }
    }

    fn state(&self) -> EngineState {
        self.inner.borrow().state.clone()
    }

    fn is_active(&self) -> bool {
        self.inner.borrow().state.is_initialized
    }

    fn has_next_step(&self) -> bool {
        let inner = self.inner.borrow();
        inner
            .state
            .active_index
            .is_some_and(|i| i + 1 < inner.steps.len())
    }

    fn has_previous_step(&self) -> bool {
        self.inner.borrow().state.active_index.is_some_and(|i| i > 0)
    }

    fn is_first_step(&self) -> bool {
        self.inner.borrow().state.active_index == Some(0)
    }

    fn is_last_step(&self) -> bool {
        let inner = self.inner.borrow();
        inner.state.active_index.is_some() && inner.state.active_index == inner.steps.len().checked_sub(1)
    }

    fn move_next(&self) {
        let Some(index) = self.active_index() else {
            return;
        };
        if self.has_next_step() {
            self.activate(index + 1);
        } else {
            let _ = self.finish();
        }
    }

    fn move_previous(&self) {
        if let Some(index) = self.active_index().filter(|i| *i > 0) {
            self.activate(index - 1);
        }
    }

    fn move_to(&self, step_index: usize) {
        if step_index < self.step_count() {
            self.activate(step_index);
        }
    }

    fn watch(&self, on_change: Rc<dyn Fn()>) -> Option<Subscription> {
        Some(self.revision.subscribe(move |_| on_change()))
    }
}
