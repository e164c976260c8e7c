#![forbid(unsafe_code)]

//! Scriptable engine that records every mutating call.
//!
//! `RecordingEngine` walks its configured steps like a real engine but never
//! looks anything up: element targets become the active element, selector
//! targets leave it empty. Tests can make `destroy` fail or panic, hide
//! capabilities, and decide whether the engine supports change watches.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tourbind::{
    Capability, DestroyHook, DestroyedEvent, DriveStep, EngineConfig, EngineError, EngineFactory,
    EngineState, ResolvedTarget, SharedEngine, TourConfig, TourEngine, factory,
};
use tourbind_dom::Element;
use tourbind_reactive::{Observable, Subscription};

/// A mutating call, as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetConfig { steps: Vec<DriveStep> },
    Drive(usize),
    Highlight(DriveStep),
    Destroy,
    Refresh,
    MoveNext,
    MovePrevious,
    MoveTo(usize),
}

/// How `destroy` misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestroyMode {
    #[default]
    Clean,
    Fail,
    Panic,
}

pub struct RecordingEngine {
    label: u64,
    calls: RefCell<Vec<EngineCall>>,
    steps: RefCell<Vec<DriveStep>>,
    tour: RefCell<TourConfig>,
    hook: RefCell<Option<DestroyHook>>,
    state: RefCell<EngineState>,
    queries: Cell<u64>,
    destroy_mode: Cell<DestroyMode>,
    capabilities: RefCell<Option<Vec<Capability>>>,
    push: Cell<bool>,
    revision: Observable<u64>,
}

impl std::fmt::Debug for RecordingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingEngine")
            .field("label", &self.label)
            .field("calls", &self.calls.borrow().len())
            .finish_non_exhaustive()
    }
}

impl RecordingEngine {
    #[must_use]
    pub fn new(label: u64) -> Self {
        Self {
            label,
            calls: RefCell::new(Vec::new()),
            steps: RefCell::new(Vec::new()),
            tour: RefCell::new(TourConfig::default()),
            hook: RefCell::new(None),
            state: RefCell::new(EngineState::default()),
            queries: Cell::new(0),
            destroy_mode: Cell::new(DestroyMode::Clean),
            capabilities: RefCell::new(None),
            push: Cell::new(false),
            revision: Observable::new(0),
        }
    }

    #[must_use]
    pub fn label(&self) -> u64 {
        self.label
    }

    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    #[must_use]
    pub fn destroy_calls(&self) -> usize {
        self.count(|c| *c == EngineCall::Destroy)
    }

    /// Steps from the most recent `set_config`.
    #[must_use]
    pub fn configured_steps(&self) -> Vec<DriveStep> {
        self.steps.borrow().clone()
    }

    #[must_use]
    pub fn configured_tour(&self) -> TourConfig {
        self.tour.borrow().clone()
    }

    /// Number of read-only queries answered.
    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.queries.get()
    }

    pub fn set_destroy_mode(&self, mode: DestroyMode) {
        self.destroy_mode.set(mode);
    }

    /// Restrict the advertised capability set.
    pub fn set_capabilities(&self, capabilities: Vec<Capability>) {
        *self.capabilities.borrow_mut() = Some(capabilities);
    }

    /// Make `watch` available.
    pub fn enable_push(&self) {
        self.push.set(true);
    }

    /// Overwrite the state and notify watchers.
    pub fn set_state(&self, state: EngineState) {
        *self.state.borrow_mut() = state;
        self.changed();
    }

    /// Notify watchers without changing anything.
    pub fn emit_change(&self) {
        self.changed();
    }

    /// End the tour as if the user closed it, regardless of destroy mode.
    pub fn finish(&self) {
        self.end_tour();
    }

    fn record(&self, call: EngineCall) {
        self.calls.borrow_mut().push(call);
    }

    fn query(&self) {
        self.queries.set(self.queries.get() + 1);
    }

    fn changed(&self) {
        self.revision.update(|r| *r += 1);
    }

    fn activate(&self, index: usize) {
        let Some(step) = self.steps.borrow().get(index).cloned() else {
            return;
        };
        let element = match &step.target {
            Some(ResolvedTarget::Element(el)) => Some(el.clone()),
            _ => None,
        };
        {
            let mut state = self.state.borrow_mut();
            state.previous_step = state.active_step.take();
            state.previous_element = state.active_element.take();
            state.is_initialized = true;
            state.active_index = Some(index);
            state.active_step = Some(step);
            state.active_element = element;
        }
        self.changed();
    }

    fn end_tour(&self) {
        let state = std::mem::take(&mut *self.state.borrow_mut());
        let hook = self.hook.borrow().clone();
        self.changed();
        if let Some(hook) = hook {
            hook.fire(&DestroyedEvent {
                step: state.active_step,
                element: state.active_element,
            });
        }
    }
}

impl TourEngine for RecordingEngine {
    fn set_config(&self, config: EngineConfig) {
        self.record(EngineCall::SetConfig {
            steps: config.steps.clone(),
        });
        *self.steps.borrow_mut() = config.steps;
        *self.tour.borrow_mut() = config.tour;
        *self.hook.borrow_mut() = config.on_destroyed;
    }

    fn drive(&self, step_index: usize) {
        self.record(EngineCall::Drive(step_index));
        self.activate(step_index);
    }

    fn highlight(&self, step: DriveStep) {
        self.record(EngineCall::Highlight(step.clone()));
        let element = match &step.target {
            Some(ResolvedTarget::Element(el)) => Some(el.clone()),
            _ => None,
        };
        {
            let mut state = self.state.borrow_mut();
            state.is_initialized = true;
            state.active_index = None;
            state.active_step = Some(step);
            state.active_element = element;
        }
        self.changed();
    }

    fn destroy(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Destroy);
        match self.destroy_mode.get() {
            DestroyMode::Clean => {
                self.end_tour();
                Ok(())
            }
            DestroyMode::Fail => Err(EngineError::Failed(format!(
                "engine {} refused to destroy",
                self.label
            ))),
            DestroyMode::Panic => panic!("engine {} panicked in destroy", self.label),
        }
    }

    fn refresh(&self) {
        self.record(EngineCall::Refresh);
    }

    fn state(&self) -> EngineState {
        self.query();
        self.state.borrow().clone()
    }

    fn is_active(&self) -> bool {
        self.query();
        self.state.borrow().is_initialized
    }

    fn has_next_step(&self) -> bool {
        self.query();
        let len = self.steps.borrow().len();
        self.state.borrow().active_index.is_some_and(|i| i + 1 < len)
    }

    fn has_previous_step(&self) -> bool {
        self.query();
        self.state.borrow().active_index.is_some_and(|i| i > 0)
    }

    fn is_first_step(&self) -> bool {
        self.query();
        self.state.borrow().active_index == Some(0)
    }

    fn is_last_step(&self) -> bool {
        self.query();
        let len = self.steps.borrow().len();
        self.state
            .borrow()
            .active_index
            .is_some_and(|i| i + 1 == len)
    }

    fn move_next(&self) {
        self.record(EngineCall::MoveNext);
        let index = self.state.borrow().active_index;
        let len = self.steps.borrow().len();
        match index {
            Some(i) if i + 1 < len => self.activate(i + 1),
            Some(_) => self.end_tour(),
            None => {}
        }
    }

    fn move_previous(&self) {
        self.record(EngineCall::MovePrevious);
        let index = self.state.borrow().active_index;
        if let Some(i) = index.filter(|i| *i > 0) {
            self.activate(i - 1);
        }
    }

    fn move_to(&self, step_index: usize) {
        self.record(EngineCall::MoveTo(step_index));
        self.activate(step_index);
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.capabilities
            .borrow()
            .clone()
            .unwrap_or_else(|| Capability::ALL.to_vec())
    }

    fn watch(&self, on_change: Rc<dyn Fn()>) -> Option<Subscription> {
        if !self.push.get() {
            return None;
        }
        Some(self.revision.subscribe(move |_| on_change()))
    }
}

/// Engine factory that keeps every instance it builds.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    created: Rc<RefCell<Vec<Rc<RecordingEngine>>>>,
    setup: Option<Rc<dyn Fn(&RecordingEngine)>>,
}

impl RecordingFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on each new instance before it is handed out.
    #[must_use]
    pub fn with_setup(mut self, f: impl Fn(&RecordingEngine) + 'static) -> Self {
        self.setup = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn factory(&self) -> EngineFactory {
        let created = Rc::clone(&self.created);
        let setup = self.setup.clone();
        factory(move || {
            let label = created.borrow().len() as u64 + 1;
            let engine = Rc::new(RecordingEngine::new(label));
            if let Some(setup) = &setup {
                setup(&engine);
            }
            created.borrow_mut().push(Rc::clone(&engine));
            let shared: SharedEngine = engine;
            shared
        })
    }

    #[must_use]
    pub fn instances(&self) -> Vec<Rc<RecordingEngine>> {
        self.created.borrow().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Rc<RecordingEngine>> {
        self.created.borrow().last().cloned()
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.created.borrow().len()
    }
}

/// A step targeting a fresh detached element, titled `title`.
#[must_use]
pub fn element_step(title: &str) -> (Element, tourbind::StepDescriptor) {
    let el = Element::new("div").with_attr("id", title);
    let step = tourbind::StepDescriptor::new(el.clone()).with_popover(tourbind::Popover::titled(title));
    (el, step)
}
