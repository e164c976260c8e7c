#![forbid(unsafe_code)]

//! Tourbind
//!
//! Binds a stateful, imperative tour engine to a reactive UI layer.
//!
//! # Key Components
//!
//! - [`resolve`] - turns step descriptors (selectors, elements, accessors,
//!   reactive handles) into steps the engine can drive
//! - [`collect`] - discovers ordered steps from marker attributes under a
//!   mounted root
//! - [`StateMirror`] - copies engine state into [`TourFields`] by polling or
//!   by the engine's change watch
//! - [`ScopedEngine`] / [`EngineRegistry`] - per-component and singleton
//!   engine ownership
//! - [`ExposedApi`] - name-addressed call surface over an engine instance
//! - [`use_tour`] / [`Tour`] - the composable and component entry points
//! - [`StepDirective`] / [`HighlightDirective`] - element hooks
//!
//! # How it fits together
//! `use_tour` runs inside a component [`Scope`], binds an engine through
//! [`EngineSource`], and returns a [`TourHandle`]. `drive` resolves the step
//! list, starts the mirror, configures the engine with a one-shot destroy
//! hook and starts the tour. When the engine reports destruction the mirror
//! stops and its fields return to the baseline.

pub mod collect;
pub mod component;
pub mod composable;
pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
pub mod expose;
pub mod headless;
pub mod lifecycle;
pub mod mirror;
pub mod resolve;
pub mod scope;
pub mod step;

pub use collect::{ORDER_MARKER, POPOVER_MARKER, collect, parse_order};
pub use component::Tour;
pub use composable::{DestroyedCallback, TourHandle, TourOptions, use_tour};
pub use config::{BridgeConfig, ConfigError, OverlayClick, ResolutionTiming, SyncMode, TourConfig};
pub use directive::{
    Directive, DirectiveBinding, DirectiveRegistry, HighlightDirective, StepDirective,
    install_directives,
};
pub use engine::{
    Capability, DestroyHook, DestroyedEvent, EngineConfig, EngineState, SharedEngine, TourEngine,
};
pub use error::{EngineError, Result, TargetError, TourError};
pub use expose::{Args, ExposedApi, Reply};
pub use headless::HeadlessEngine;
pub use lifecycle::{
    BoundEngine, EngineFactory, EngineRegistry, EngineSource, ScopedEngine, destroy_quietly,
    factory,
};
pub use mirror::{MirrorSnapshot, StateMirror, SyncStrategy, TourFields};
pub use resolve::{Resolution, ResolvedSteps, resolve, resolve_all, resolve_highlight};
pub use scope::{Phase, Scope};
pub use step::{
    DriveStep, ElementRef, Popover, PopoverAlign, PopoverButton, PopoverSide, ResolvedTarget,
    StepDescriptor, StepSource, StepTarget, TargetAccessor,
};

pub use tourbind_dom::Element;
pub use tourbind_reactive::{Duration, EventLoop, Observable, Subscription};
