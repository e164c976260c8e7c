#![forbid(unsafe_code)]

//! The tour engine contract.
//!
//! The bridge treats the engine as a black box reachable only through
//! [`TourEngine`]. Engines are shared as `Rc<dyn TourEngine>` on the UI
//! thread and use interior mutability, so every method takes `&self`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tourbind_dom::Element;
use tourbind_reactive::Subscription;

use crate::config::TourConfig;
use crate::error::EngineError;
use crate::step::DriveStep;

/// Snapshot of the engine's internal state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    pub is_initialized: bool,
    pub active_index: Option<usize>,
    pub active_step: Option<DriveStep>,
    pub previous_step: Option<DriveStep>,
    pub active_element: Option<Element>,
    pub previous_element: Option<Element>,
}

/// Payload of the destroy notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DestroyedEvent {
    /// Step that was active when the tour ended, if any.
    pub step: Option<DriveStep>,
    pub element: Option<Element>,
}

type DestroyCallback = Box<dyn FnOnce(&DestroyedEvent)>;

/// One-shot destroy notification registered through [`EngineConfig`].
///
/// Clones share the slot, so whichever clone fires first consumes it.
#[derive(Clone, Default)]
pub struct DestroyHook {
    slot: Rc<RefCell<Option<DestroyCallback>>>,
}

impl DestroyHook {
    pub fn new(f: impl FnOnce(&DestroyedEvent) + 'static) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(Box::new(f)))),
        }
    }

    /// Run the callback if it has not run yet. Returns whether it ran.
    pub fn fire(&self, event: &DestroyedEvent) -> bool {
        // Take before calling so a re-entrant fire sees an empty slot.
        let callback = self.slot.borrow_mut().take();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.slot.borrow().is_none()
    }
}

impl fmt::Debug for DestroyHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyHook")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Everything the engine needs for one tour.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub steps: Vec<DriveStep>,
    pub tour: TourConfig,
    pub on_destroyed: Option<DestroyHook>,
}

/// Named engine operations, as enumerated by the capability exposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    SetConfig,
    Drive,
    Highlight,
    Destroy,
    Refresh,
    GetState,
    IsActive,
    HasNextStep,
    HasPreviousStep,
    IsFirstStep,
    IsLastStep,
    GetActiveIndex,
    GetActiveStep,
    GetPreviousStep,
    GetActiveElement,
    GetPreviousElement,
    MoveNext,
    MovePrevious,
    MoveTo,
}

impl Capability {
    pub const ALL: [Capability; 19] = [
        Capability::SetConfig,
        Capability::Drive,
        Capability::Highlight,
        Capability::Destroy,
        Capability::Refresh,
        Capability::GetState,
        Capability::IsActive,
        Capability::HasNextStep,
        Capability::HasPreviousStep,
        Capability::IsFirstStep,
        Capability::IsLastStep,
        Capability::GetActiveIndex,
        Capability::GetActiveStep,
        Capability::GetPreviousStep,
        Capability::GetActiveElement,
        Capability::GetPreviousElement,
        Capability::MoveNext,
        Capability::MovePrevious,
        Capability::MoveTo,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SetConfig => "set_config",
            Self::Drive => "drive",
            Self::Highlight => "highlight",
            Self::Destroy => "destroy",
            Self::Refresh => "refresh",
            Self::GetState => "get_state",
            Self::IsActive => "is_active",
            Self::HasNextStep => "has_next_step",
            Self::HasPreviousStep => "has_previous_step",
            Self::IsFirstStep => "is_first_step",
            Self::IsLastStep => "is_last_step",
            Self::GetActiveIndex => "get_active_index",
            Self::GetActiveStep => "get_active_step",
            Self::GetPreviousStep => "get_previous_step",
            Self::GetActiveElement => "get_active_element",
            Self::GetPreviousElement => "get_previous_element",
            Self::MoveNext => "move_next",
            Self::MovePrevious => "move_previous",
            Self::MoveTo => "move_to",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability set of a stateful tour engine.
pub trait TourEngine {
    fn set_config(&self, config: EngineConfig);

    /// Start the configured tour at `step_index`.
    fn drive(&self, step_index: usize);

    /// Highlight a single step outside of any tour.
    fn highlight(&self, step: DriveStep);

    /// Tear down the overlay and end the tour.
    fn destroy(&self) -> Result<(), EngineError>;

    /// Recompute the overlay position for the active step.
    fn refresh(&self);

    fn state(&self) -> EngineState;

    fn is_active(&self) -> bool;
    fn has_next_step(&self) -> bool;
    fn has_previous_step(&self) -> bool;
    fn is_first_step(&self) -> bool;
    fn is_last_step(&self) -> bool;

    fn move_next(&self);
    fn move_previous(&self);
    fn move_to(&self, step_index: usize);

    fn active_index(&self) -> Option<usize> {
        self.state().active_index
    }

    fn active_step(&self) -> Option<DriveStep> {
        self.state().active_step
    }

    fn previous_step(&self) -> Option<DriveStep> {
        self.state().previous_step
    }

    fn active_element(&self) -> Option<Element> {
        self.state().active_element
    }

    fn previous_element(&self) -> Option<Element> {
        self.state().previous_element
    }

    /// Operations this instance exposes.
    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL.to_vec()
    }

    /// Register a change listener for push synchronisation.
    ///
    /// Engines that cannot report changes return `None`.
    fn watch(&self, _on_change: Rc<dyn Fn()>) -> Option<Subscription> {
        None
    }
}

/// Shared handle to an engine instance.
pub type SharedEngine = Rc<dyn TourEngine>;
