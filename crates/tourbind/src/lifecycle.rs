#![forbid(unsafe_code)]

//! Engine ownership.
//!
//! Two variants:
//!
//! - [`ScopedEngine`]: one instance per component scope, created on first
//!   acquire and destroyed when the scope unmounts.
//! - [`EngineRegistry`]: at most one live instance shared by everyone.
//!   Acquiring installs a fresh instance and then destroys the previous
//!   one; a failing or panicking destroy is logged and swallowed.
//!
//! Both also track the single [`StateMirror`] allowed to mirror their
//! instance: claiming a new mirror stops the previous one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::{SharedEngine, TourEngine};
use crate::mirror::StateMirror;
use crate::scope::Scope;

/// Builds a fresh engine instance.
pub type EngineFactory = Rc<dyn Fn() -> SharedEngine>;

/// Wrap a closure as an [`EngineFactory`].
pub fn factory(f: impl Fn() -> SharedEngine + 'static) -> EngineFactory {
    Rc::new(f)
}

/// Destroy `engine`, logging and discarding any failure or panic.
///
/// Returns whether the destroy completed cleanly.
pub fn destroy_quietly(engine: &dyn TourEngine, reason: &'static str) -> bool {
    match catch_unwind(AssertUnwindSafe(|| engine.destroy())) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(reason, error = %err, "engine destroy failed; ignoring");
            false
        }
        Err(_) => {
            warn!(reason, "engine destroy panicked; ignoring");
            false
        }
    }
}

fn claim(slot: &RefCell<Option<StateMirror>>, mirror: &StateMirror) {
    let previous = slot.replace(Some(mirror.clone()));
    if let Some(previous) = previous.filter(|p| p != mirror) {
        previous.stop();
        debug!(
            mirror_id = previous.id(),
            replaced_by = mirror.id(),
            "previous state mirror released"
        );
    }
}

fn stop_claimed(slot: &RefCell<Option<StateMirror>>) {
    let claimed = slot.borrow_mut().take();
    if let Some(mirror) = claimed {
        mirror.stop();
    }
}

struct ScopedSlot {
    scope_id: u64,
    factory: EngineFactory,
    engine: RefCell<Option<SharedEngine>>,
    mirror: RefCell<Option<StateMirror>>,
    torn_down: Cell<bool>,
}

/// Engine owned by a single component scope.
#[derive(Clone)]
pub struct ScopedEngine {
    slot: Rc<ScopedSlot>,
}

impl fmt::Debug for ScopedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedEngine")
            .field("scope_id", &self.slot.scope_id)
            .field("live", &self.slot.engine.borrow().is_some())
            .field("torn_down", &self.slot.torn_down.get())
            .finish()
    }
}

impl ScopedEngine {
    /// The owner attached to `scope`, creating and registering it if needed.
    ///
    /// The first call registers teardown on unmount; later calls return the
    /// same owner regardless of `factory`.
    pub fn attach(scope: &Scope, factory: EngineFactory) -> Self {
        if let Some(existing) = scope.inject::<ScopedEngine>() {
            return existing;
        }
        let owner = Self {
            slot: Rc::new(ScopedSlot {
                scope_id: scope.id(),
                factory,
                engine: RefCell::new(None),
                mirror: RefCell::new(None),
                torn_down: Cell::new(false),
            }),
        };
        scope.provide(owner.clone());
        let on_unmount = owner.clone();
        scope.on_unmounted(move || on_unmount.teardown());
        owner
    }

    /// The scope's engine. Created on first call, then reused.
    ///
    /// `None` once the scope has been torn down: nothing would destroy an
    /// instance created after unmount.
    pub fn acquire(&self) -> Option<SharedEngine> {
        if self.slot.torn_down.get() {
            debug!(scope_id = self.slot.scope_id, "acquire after teardown refused");
            return None;
        }
        if let Some(engine) = self.slot.engine.borrow().as_ref() {
            return Some(Rc::clone(engine));
        }
        let engine = (self.slot.factory)();
        *self.slot.engine.borrow_mut() = Some(Rc::clone(&engine));
        debug!(scope_id = self.slot.scope_id, "scoped engine created");
        Some(engine)
    }

    #[must_use]
    pub fn engine(&self) -> Option<SharedEngine> {
        self.slot.engine.borrow().clone()
    }

    /// Destroy the current instance (if any) and create a new one.
    pub fn replace(&self) -> Option<SharedEngine> {
        if self.slot.torn_down.get() {
            return None;
        }
        let old = self.slot.engine.borrow_mut().take();
        stop_claimed(&self.slot.mirror);
        if let Some(old) = old {
            destroy_quietly(old.as_ref(), "scoped replace");
        }
        self.acquire()
    }

    /// Stop the claimed mirror and destroy the engine. Idempotent.
    pub fn teardown(&self) {
        if self.slot.torn_down.replace(true) {
            return;
        }
        stop_claimed(&self.slot.mirror);
        let engine = self.slot.engine.borrow_mut().take();
        if let Some(engine) = engine {
            destroy_quietly(engine.as_ref(), "scope unmounted");
            debug!(scope_id = self.slot.scope_id, "scoped engine torn down");
        }
    }

    pub fn claim_mirror(&self, mirror: &StateMirror) {
        claim(&self.slot.mirror, mirror);
    }
}

/// Process-wide single engine instance.
pub struct EngineRegistry {
    factory: EngineFactory,
    current: RefCell<Option<SharedEngine>>,
    installing: RefCell<Option<SharedEngine>>,
    mirror: RefCell<Option<StateMirror>>,
    generation: Cell<u64>,
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("live", &self.current.borrow().is_some())
            .field("generation", &self.generation.get())
            .finish()
    }
}

impl EngineRegistry {
    #[must_use]
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            current: RefCell::new(None),
            installing: RefCell::new(None),
            mirror: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// Install a fresh instance, then destroy the previous one.
    ///
    /// An acquire issued while a replacement is in progress (for example
    /// from a destroy callback) returns the instance being installed.
    pub fn acquire(&self) -> SharedEngine {
        if let Some(in_flight) = self.installing.borrow().as_ref() {
            debug!("re-entrant acquire joined in-flight replacement");
            return Rc::clone(in_flight);
        }

        let fresh = (self.factory)();
        *self.installing.borrow_mut() = Some(Rc::clone(&fresh));
        let previous = self.current.replace(Some(Rc::clone(&fresh)));
        stop_claimed(&self.mirror);
        if let Some(previous) = previous {
            destroy_quietly(previous.as_ref(), "singleton replaced");
        }
        self.installing.borrow_mut().take();

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        debug!(engine_id = generation, "singleton engine installed");
        fresh
    }

    /// The live instance. Callers re-fetch rather than cache it.
    #[must_use]
    pub fn current(&self) -> Option<SharedEngine> {
        self.current.borrow().clone()
    }

    pub fn get_or_acquire(&self) -> SharedEngine {
        match self.current() {
            Some(engine) => engine,
            None => self.acquire(),
        }
    }

    /// Drop the live instance, destroying it.
    pub fn release(&self) {
        let previous = self.current.borrow_mut().take();
        stop_claimed(&self.mirror);
        if let Some(previous) = previous {
            destroy_quietly(previous.as_ref(), "singleton released");
        }
    }

    /// Number of instances installed so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn claim_mirror(&self, mirror: &StateMirror) {
        claim(&self.mirror, mirror);
    }
}

/// Where a tour gets its engine.
#[derive(Clone)]
pub enum EngineSource {
    /// A private instance for the calling scope.
    Scoped(EngineFactory),
    /// The shared singleton.
    Shared(Rc<EngineRegistry>),
}

impl fmt::Debug for EngineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scoped(_) => f.write_str("Scoped(..)"),
            Self::Shared(registry) => f.debug_tuple("Shared").field(registry).finish(),
        }
    }
}

impl EngineSource {
    /// Bind to `scope`, acquiring an instance.
    pub fn bind(&self, scope: &Scope) -> BoundEngine {
        match self {
            Self::Scoped(factory) => {
                let owner = ScopedEngine::attach(scope, Rc::clone(factory));
                owner.acquire();
                BoundEngine::Scoped(owner)
            }
            Self::Shared(registry) => {
                registry.acquire();
                BoundEngine::Shared(Rc::clone(registry))
            }
        }
    }
}

/// An engine owner as seen by one tour handle.
#[derive(Debug, Clone)]
pub enum BoundEngine {
    Scoped(ScopedEngine),
    Shared(Rc<EngineRegistry>),
}

impl BoundEngine {
    /// The instance to talk to right now.
    #[must_use]
    pub fn engine(&self) -> Option<SharedEngine> {
        match self {
            Self::Scoped(owner) => owner.engine(),
            Self::Shared(registry) => registry.current(),
        }
    }

    pub fn claim_mirror(&self, mirror: &StateMirror) {
        match self {
            Self::Scoped(owner) => owner.claim_mirror(mirror),
            Self::Shared(registry) => registry.claim_mirror(mirror),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessEngine;
    use tourbind_dom::Element;

    fn headless_factory(created: Rc<Cell<u32>>) -> EngineFactory {
        factory(move || {
            created.set(created.get() + 1);
            let engine: SharedEngine = HeadlessEngine::shared(Element::new("body"));
            engine
        })
    }

    #[test]
    fn scoped_acquire_reuses_until_unmount() {
        let created = Rc::new(Cell::new(0));
        let scope = Scope::new();
        let owner = ScopedEngine::attach(&scope, headless_factory(Rc::clone(&created)));
        let a = owner.acquire().unwrap();
        let b = ScopedEngine::attach(&scope, headless_factory(Rc::clone(&created)))
            .acquire()
            .unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(created.get(), 1);

        scope.unmount();
        assert!(owner.engine().is_none());
    }

    #[test]
    fn torn_down_owner_never_creates_again() {
        let created = Rc::new(Cell::new(0));
        let scope = Scope::new();
        let owner = ScopedEngine::attach(&scope, headless_factory(Rc::clone(&created)));
        owner.acquire().unwrap();
        scope.unmount();

        assert!(owner.replace().is_none());
        assert!(owner.acquire().is_none());
        scope.unmount();
        assert!(owner.engine().is_none());
        assert_eq!(created.get(), 1);
    }

    #[test]
    fn scoped_replace_creates_new_instance() {
        let created = Rc::new(Cell::new(0));
        let scope = Scope::new();
        let owner = ScopedEngine::attach(&scope, headless_factory(Rc::clone(&created)));
        let a = owner.acquire().unwrap();
        let b = owner.replace().unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(created.get(), 2);
    }

    #[test]
    fn registry_keeps_one_live_instance() {
        let created = Rc::new(Cell::new(0));
        let registry = EngineRegistry::new(headless_factory(Rc::clone(&created)));
        assert!(registry.current().is_none());
        let a = registry.acquire();
        let b = registry.acquire();
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(registry.current().is_some_and(|c| Rc::ptr_eq(&c, &b)));
        assert!(Rc::ptr_eq(&registry.get_or_acquire(), &b));
        assert_eq!(registry.generation(), 2);

        registry.release();
        assert!(registry.current().is_none());
    }
}
