#![forbid(unsafe_code)]

//! Component scopes: the lifecycle hooks the bridge needs from a host UI.
//!
//! A [`Scope`] stands for one component instance. Code running inside
//! [`Scope::setup`] can find it through [`Scope::current`] and register
//! mount and unmount hooks, or stash per-instance values with
//! [`provide`](Scope::provide) / [`inject`](Scope::inject).

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tourbind_dom::Element;
use tracing::{debug, trace};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Where a scope is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Mounted,
    Unmounted,
}

type Hook = Box<dyn FnOnce()>;

struct ScopeInner {
    id: u64,
    phase: Cell<Phase>,
    root: RefCell<Option<Element>>,
    on_mounted: RefCell<Vec<Hook>>,
    on_unmounted: RefCell<Vec<Hook>>,
    provided: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

/// Handle to a component instance. Clones share the instance.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("phase", &self.inner.phase.get())
            .finish()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

/// Pops the current-scope stack even if setup panics.
struct SetupGuard;

impl Drop for SetupGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                phase: Cell::new(Phase::Setup),
                root: RefCell::new(None),
                on_mounted: RefCell::new(Vec::new()),
                on_unmounted: RefCell::new(Vec::new()),
                provided: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The scope whose setup is running on this thread, if any.
    #[must_use]
    pub fn current() -> Option<Scope> {
        CURRENT.with(|stack| stack.borrow().last().cloned())
    }

    /// Run `f` with this scope as the current one.
    pub fn setup<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = SetupGuard;
        f()
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.phase() == Phase::Mounted
    }

    /// Root element, once mounted.
    #[must_use]
    pub fn root(&self) -> Option<Element> {
        self.inner.root.borrow().clone()
    }

    /// Run `hook` when the scope mounts. Ignored once mounted.
    pub fn on_mounted(&self, hook: impl FnOnce() + 'static) {
        if self.phase() == Phase::Setup {
            self.inner.on_mounted.borrow_mut().push(Box::new(hook));
        }
    }

    /// Run `hook` when the scope unmounts. Ignored once unmounted.
    pub fn on_unmounted(&self, hook: impl FnOnce() + 'static) {
        if self.phase() != Phase::Unmounted {
            self.inner.on_unmounted.borrow_mut().push(Box::new(hook));
        }
    }

    /// Attach the rendered root and run mount hooks in registration order.
    pub fn mount(&self, root: Element) {
        if self.phase() != Phase::Setup {
            trace!(scope_id = self.inner.id, "mount ignored");
            return;
        }
        *self.inner.root.borrow_mut() = Some(root);
        self.inner.phase.set(Phase::Mounted);
        debug!(scope_id = self.inner.id, "scope mounted");
        let hooks = std::mem::take(&mut *self.inner.on_mounted.borrow_mut());
        for hook in hooks {
            hook();
        }
    }

    /// Run unmount hooks once, in registration order.
    pub fn unmount(&self) {
        if self.phase() == Phase::Unmounted {
            return;
        }
        self.inner.phase.set(Phase::Unmounted);
        self.inner.on_mounted.borrow_mut().clear();
        debug!(scope_id = self.inner.id, "scope unmounted");
        let hooks = std::mem::take(&mut *self.inner.on_unmounted.borrow_mut());
        for hook in hooks {
            hook();
        }
    }

    /// Store a per-instance value, replacing any value of the same type.
    pub fn provide<T: 'static>(&self, value: T) {
        self.inner
            .provided
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::new(value));
    }

    #[must_use]
    pub fn inject<T: Clone + 'static>(&self) -> Option<T> {
        self.inner
            .provided
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }
}
