#![forbid(unsafe_code)]

//! Flat, name-addressed call surface over an engine instance.
//!
//! [`ExposedApi`] enumerates the instance's capabilities once, at
//! construction. Calls are dispatched by name; a name outside that set
//! fails with [`TourError::OperationNotAvailable`] when called, never
//! earlier. Arguments and results are forwarded unchanged.

use std::collections::BTreeMap;

use tourbind_dom::Element;

use crate::engine::{Capability, EngineConfig, EngineState, SharedEngine};
use crate::error::{Result, TourError};
use crate::step::DriveStep;

/// Arguments of an exposed call.
#[derive(Debug, Clone, Default)]
pub enum Args {
    #[default]
    None,
    Index(usize),
    Step(DriveStep),
    Config(EngineConfig),
}

impl Args {
    fn kind(&self) -> &'static str {
        match self {
            Self::None => "no",
            Self::Index(_) => "index",
            Self::Step(_) => "step",
            Self::Config(_) => "config",
        }
    }
}

/// Result of an exposed call, exactly as the engine returned it.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Unit,
    Bool(bool),
    Index(Option<usize>),
    Step(Option<DriveStep>),
    Element(Option<Element>),
    State(EngineState),
}

impl Reply {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Name-addressed view of one engine instance.
///
/// Arguments are forwarded as given. [`TourError::ArgumentMismatch`] is the
/// typed form of calling an operation with the wrong arity: `Args` that do
/// not fit the operation's signature cannot be forwarded at all, so the
/// engine is not called.
#[derive(Clone)]
pub struct ExposedApi {
    engine: SharedEngine,
    operations: BTreeMap<&'static str, Capability>,
}

impl std::fmt::Debug for ExposedApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposedApi")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExposedApi {
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        let operations = engine
            .capabilities()
            .into_iter()
            .map(|cap| (cap.name(), cap))
            .collect();
        Self { engine, operations }
    }

    /// Operation names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.operations.keys().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// The underlying instance.
    #[must_use]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn call(&self, name: &str, args: Args) -> Result<Reply> {
        let Some(&capability) = self.operations.get(name) else {
            return Err(TourError::not_available(name));
        };
        let engine = self.engine.as_ref();
        let mismatch = |given: &Args| TourError::ArgumentMismatch {
            operation: capability.name(),
            given: given.kind(),
        };

        let reply = match (capability, args) {
            (Capability::SetConfig, Args::Config(config)) => {
                engine.set_config(config);
                Reply::Unit
            }
            (Capability::Drive, Args::Index(index)) => {
                engine.drive(index);
                Reply::Unit
            }
            (Capability::Highlight, Args::Step(step)) => {
                engine.highlight(step);
                Reply::Unit
            }
            (Capability::MoveTo, Args::Index(index)) => {
                engine.move_to(index);
                Reply::Unit
            }
            (capability, Args::None) => match capability {
                Capability::Drive => {
                    engine.drive(0);
                    Reply::Unit
                }
                Capability::Destroy => {
                    engine.destroy()?;
                    Reply::Unit
                }
                Capability::Refresh => {
                    engine.refresh();
                    Reply::Unit
                }
                Capability::MoveNext => {
                    engine.move_next();
                    Reply::Unit
                }
                Capability::MovePrevious => {
                    engine.move_previous();
                    Reply::Unit
                }
                Capability::GetState => Reply::State(engine.state()),
                Capability::IsActive => Reply::Bool(engine.is_active()),
                Capability::HasNextStep => Reply::Bool(engine.has_next_step()),
                Capability::HasPreviousStep => Reply::Bool(engine.has_previous_step()),
                Capability::IsFirstStep => Reply::Bool(engine.is_first_step()),
                Capability::IsLastStep => Reply::Bool(engine.is_last_step()),
                Capability::GetActiveIndex => Reply::Index(engine.active_index()),
                Capability::GetActiveStep => Reply::Step(engine.active_step()),
                Capability::GetPreviousStep => Reply::Step(engine.previous_step()),
                Capability::GetActiveElement => Reply::Element(engine.active_element()),
                Capability::GetPreviousElement => Reply::Element(engine.previous_element()),
                Capability::SetConfig | Capability::Highlight | Capability::MoveTo => {
                    return Err(mismatch(&Args::None));
                }
            },
            (_, other) => return Err(mismatch(&other)),
        };
        Ok(reply)
    }
}
