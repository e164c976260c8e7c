#![forbid(unsafe_code)]

//! `use_tour`: the setup-time entry point that wires an engine, a step
//! source and a state mirror into one [`TourHandle`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tourbind_reactive::EventLoop;
use tracing::{debug, warn};

use crate::collect::collect;
use crate::config::{BridgeConfig, ResolutionTiming};
use crate::engine::{DestroyHook, DestroyedEvent, EngineConfig, EngineState, SharedEngine};
use crate::error::{Result, TourError};
use crate::expose::ExposedApi;
use crate::lifecycle::{BoundEngine, EngineSource};
use crate::mirror::{StateMirror, SyncStrategy, TourFields};
use crate::resolve::{resolve_all, resolve_highlight};
use crate::scope::Scope;
use crate::step::{DriveStep, StepDescriptor, StepSource};

/// Called after the mirror has been reset by a destroy notification.
pub type DestroyedCallback = Rc<dyn Fn(&DestroyedEvent)>;

/// Inputs to [`use_tour`].
#[derive(Clone)]
pub struct TourOptions {
    pub engine: EngineSource,
    /// `None` means no steps for `use_tour` and collected steps for
    /// [`Tour`](crate::component::Tour).
    pub steps: Option<StepSource>,
    pub config: BridgeConfig,
    pub event_loop: EventLoop,
    pub on_destroyed: Option<DestroyedCallback>,
}

impl fmt::Debug for TourOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TourOptions")
            .field("engine", &self.engine)
            .field("steps", &self.steps)
            .field("config", &self.config)
            .field("on_destroyed", &self.on_destroyed.is_some())
            .finish_non_exhaustive()
    }
}

impl TourOptions {
    #[must_use]
    pub fn new(engine: EngineSource, event_loop: EventLoop) -> Self {
        Self {
            engine,
            steps: None,
            config: BridgeConfig::default(),
            event_loop,
            on_destroyed: None,
        }
    }

    #[must_use]
    pub fn steps(mut self, steps: impl Into<StepSource>) -> Self {
        self.steps = Some(steps.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn auto_run(mut self, auto_run: bool) -> Self {
        self.config.auto_run = auto_run;
        self
    }

    #[must_use]
    pub fn on_destroyed(mut self, f: impl Fn(&DestroyedEvent) + 'static) -> Self {
        self.on_destroyed = Some(Rc::new(f));
        self
    }
}

struct HandleInner {
    scope: Scope,
    bound: BoundEngine,
    steps: StepSource,
    config: BridgeConfig,
    mirror: StateMirror,
    cached: RefCell<Option<Vec<DriveStep>>>,
    on_destroyed: Option<DestroyedCallback>,
}

impl HandleInner {
    fn engine(&self) -> Result<SharedEngine> {
        self.bound.engine().ok_or(TourError::EngineMissing)
    }

    fn descriptors(&self) -> Result<Vec<StepDescriptor>> {
        match &self.steps {
            StepSource::Static(steps) => Ok(steps.clone()),
            StepSource::Reactive(steps) => Ok(steps.get()),
            StepSource::Collected => match self.scope.root() {
                Some(root) => collect(&root),
                None => {
                    debug!(scope_id = self.scope.id(), "no mounted root to collect steps from");
                    Ok(Vec::new())
                }
            },
        }
    }

    fn caches_on_mount(&self) -> bool {
        self.config.resolution == ResolutionTiming::OnMount
            && !matches!(self.steps, StepSource::Reactive(_))
    }

    fn resolve_steps(&self) -> Result<Vec<DriveStep>> {
        if self.caches_on_mount() {
            if let Some(cached) = self.cached.borrow().as_ref() {
                return Ok(cached.clone());
            }
        }
        Ok(resolve_all(&self.descriptors()?)?.steps)
    }

    fn prepare_on_mount(&self) {
        match self.descriptors().and_then(|steps| resolve_all(&steps)) {
            Ok(resolved) => *self.cached.borrow_mut() = Some(resolved.steps),
            Err(err) => warn!(error = %err, "step resolution at mount failed; drive will retry"),
        }
    }

    fn drive(&self, step_index: Option<usize>) -> Result<()> {
        let engine = self.engine()?;
        let steps = self.resolve_steps()?;

        self.bound.claim_mirror(&self.mirror);
        self.mirror.start(&engine);

        let mirror = self.mirror.clone();
        let user_hook = self.on_destroyed.clone();
        let hook = DestroyHook::new(move |event| {
            mirror.on_engine_destroyed();
            if let Some(user_hook) = user_hook {
                user_hook(event);
            }
        });

        let step_index = step_index.unwrap_or(0);
        debug!(steps = steps.len(), step_index, "driving tour");
        engine.set_config(EngineConfig {
            steps,
            tour: self.config.tour.clone(),
            on_destroyed: Some(hook),
        });
        engine.drive(step_index);
        Ok(())
    }
}

/// What [`use_tour`] returns. Clones share the same tour.
#[derive(Clone)]
pub struct TourHandle {
    inner: Rc<HandleInner>,
}

impl fmt::Debug for TourHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TourHandle")
            .field("scope", &self.inner.scope)
            .field("mirror", &self.inner.mirror)
            .finish_non_exhaustive()
    }
}

impl TourHandle {
    /// Resolve steps, start mirroring, configure the engine and start at
    /// `step_index` (default 0).
    ///
    /// A resolution error aborts before the mirror starts or the engine is
    /// touched.
    pub fn drive(&self, step_index: Option<usize>) -> Result<()> {
        self.inner.drive(step_index)
    }

    /// Highlight one step now. A target that resolves to nothing is logged
    /// and ignored.
    pub fn highlight(&self, step: &StepDescriptor) -> Result<()> {
        let Some(step) = resolve_highlight(step)? else {
            return Ok(());
        };
        self.inner.engine()?.highlight(step);
        Ok(())
    }

    /// End the tour. The destroy notification resets the fields.
    pub fn destroy(&self) -> Result<()> {
        self.inner.engine()?.destroy()?;
        Ok(())
    }

    /// Return the fields to the baseline without touching the engine.
    pub fn reset(&self) {
        self.inner.mirror.reset();
    }

    /// Call surface of the live engine.
    pub fn api(&self) -> Result<ExposedApi> {
        Ok(ExposedApi::new(self.inner.engine()?))
    }

    #[must_use]
    pub fn fields(&self) -> &TourFields {
        self.inner.mirror.fields()
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.fields().state.get()
    }

    #[must_use]
    pub fn mirror(&self) -> &StateMirror {
        &self.inner.mirror
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// The steps the next `drive` would hand to the engine.
    pub fn resolved_steps(&self) -> Result<Vec<DriveStep>> {
        self.inner.resolve_steps()
    }
}

/// Bind a tour to the component whose setup is running.
///
/// Fails with [`TourError::Context`] outside [`Scope::setup`].
pub fn use_tour(options: TourOptions) -> Result<TourHandle> {
    let scope = Scope::current().ok_or_else(|| TourError::context("use_tour"))?;
    let bound = options.engine.bind(&scope);
    let mirror = StateMirror::new(
        TourFields::new(),
        SyncStrategy::from_config(&options.config),
        options.event_loop,
    );

    let inner = Rc::new(HandleInner {
        scope: scope.clone(),
        bound,
        steps: options.steps.unwrap_or_else(|| StepSource::Static(Vec::new())),
        config: options.config,
        mirror,
        cached: RefCell::new(None),
        on_destroyed: options.on_destroyed,
    });

    let weak: Weak<HandleInner> = Rc::downgrade(&inner);
    if inner.caches_on_mount() {
        let weak = weak.clone();
        scope.on_mounted(move || {
            if let Some(inner) = weak.upgrade() {
                inner.prepare_on_mount();
            }
        });
    }
    if inner.config.auto_run {
        let weak = weak.clone();
        scope.on_mounted(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(err) = inner.drive(None) {
                    warn!(error = %err, "auto-run drive failed");
                }
            }
        });
    }
    scope.on_unmounted(move || {
        if let Some(inner) = weak.upgrade() {
            inner.mirror.stop();
        }
    });

    Ok(TourHandle { inner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expose::{Args, Reply};
    use crate::headless::HeadlessEngine;
    use crate::lifecycle::factory;
    use crate::step::Popover;
    use tourbind_dom::Element;

    fn options(document: &Element) -> TourOptions {
        let document = document.clone();
        TourOptions::new(
            EngineSource::Scoped(factory(move || {
                let engine: SharedEngine = HeadlessEngine::shared(document.clone());
                engine
            })),
            EventLoop::new(),
        )
    }

    #[test]
    fn outside_setup_is_a_context_error() {
        let err = use_tour(options(&Element::new("body"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "use_tour must be called within a component setup function"
        );
    }

    #[test]
    fn drive_defaults_to_first_step() {
        let document = Element::new("body").with_child(Element::new("h1").with_attr("id", "a"));
        let scope = Scope::new();
        let tour = scope
            .setup(|| {
                use_tour(options(&document).steps(vec![
                    StepDescriptor::new("#a").with_popover(Popover::titled("A")),
                    StepDescriptor::new("#b"),
                ]))
            })
            .unwrap();

        tour.drive(None).unwrap();
        let api = tour.api().unwrap();
        assert_eq!(
            api.call("get_active_index", Args::None).unwrap(),
            Reply::Index(Some(0))
        );
        assert!(tour.mirror().is_running());
    }

    #[test]
    fn on_mount_resolution_is_cached() {
        let document = Element::new("body");
        let scope = Scope::new();
        let mut config = BridgeConfig::default();
        config.resolution = ResolutionTiming::OnMount;
        let tour = scope
            .setup(|| use_tour(options(&document).steps(vec![StepDescriptor::new("#a")]).config(config)))
            .unwrap();
        scope.mount(document.clone());
        let first = tour.resolved_steps().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(tour.resolved_steps().unwrap(), first);
    }

    #[test]
    fn unmount_stops_the_mirror() {
        let document = Element::new("body");
        let scope = Scope::new();
        let tour = scope.setup(|| use_tour(options(&document))).unwrap();
        scope.mount(document.clone());
        tour.drive(None).unwrap();
        scope.unmount();
        assert!(!tour.mirror().is_running());
        assert!(matches!(tour.drive(None), Err(TourError::EngineMissing)));
    }
}
