#![forbid(unsafe_code)]

//! Step descriptors and the concrete steps handed to the engine.

use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tourbind_dom::Element;
use tourbind_reactive::Observable;

use crate::error::TargetError;

/// Popover button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopoverButton {
    Next,
    Previous,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopoverSide {
    Top,
    Right,
    Bottom,
    Left,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopoverAlign {
    Start,
    Center,
    End,
}

/// Display configuration for one step.
///
/// The bridge never interprets it. Any JSON object is accepted: the typed
/// fields are a best-effort view, and a key that is missing from them or
/// whose value does not fit its field stays in `extra`, so it reaches the
/// engine untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct Popover {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<PopoverSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<PopoverAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_buttons: Option<Vec<PopoverButton>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popover_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_progress: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Move `key` out of `map` if its value fits `T`; otherwise leave it there.
fn take_typed<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.remove(key)?;
    match T::deserialize(&value) {
        Ok(typed) => Some(typed),
        Err(_) => {
            map.insert(key.to_string(), value);
            None
        }
    }
}

impl From<Map<String, Value>> for Popover {
    fn from(mut extra: Map<String, Value>) -> Self {
        Self {
            title: take_typed(&mut extra, "title"),
            description: take_typed(&mut extra, "description"),
            side: take_typed(&mut extra, "side"),
            align: take_typed(&mut extra, "align"),
            show_buttons: take_typed(&mut extra, "showButtons"),
            popover_class: take_typed(&mut extra, "popoverClass"),
            show_progress: take_typed(&mut extra, "showProgress"),
            extra,
        }
    }
}

impl Popover {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_side(mut self, side: PopoverSide) -> Self {
        self.side = Some(side);
        self
    }

    /// Marker attribute encoding.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Zero-argument target lookup run at resolution time.
pub type TargetAccessor = Rc<dyn Fn() -> Result<Option<Element>, TargetError>>;

/// Reactive handle to an element that may not be bound yet.
pub type ElementRef = Observable<Option<Element>>;

/// Where a step points, before resolution.
#[derive(Clone)]
pub enum StepTarget {
    /// Looked up by the engine at drive time.
    Selector(String),
    Element(Element),
    Accessor(TargetAccessor),
    Handle(ElementRef),
    /// No target. Always skipped.
    Pending,
}

impl StepTarget {
    pub fn accessor(
        f: impl Fn() -> Result<Option<Element>, TargetError> + 'static,
    ) -> Self {
        Self::Accessor(Rc::new(f))
    }
}

impl fmt::Debug for StepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector(s) => f.debug_tuple("Selector").field(s).finish(),
            Self::Element(el) => f.debug_tuple("Element").field(el).finish(),
            Self::Accessor(_) => f.write_str("Accessor(..)"),
            Self::Handle(handle) => f.debug_tuple("Handle").field(&handle.get()).finish(),
            Self::Pending => f.write_str("Pending"),
        }
    }
}

impl PartialEq for StepTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Selector(a), Self::Selector(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Accessor(a), Self::Accessor(b)) => Rc::ptr_eq(a, b),
            (Self::Handle(a), Self::Handle(b)) => a == b,
            (Self::Pending, Self::Pending) => true,
            _ => false,
        }
    }
}

impl From<&str> for StepTarget {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for StepTarget {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<Element> for StepTarget {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

impl From<ElementRef> for StepTarget {
    fn from(handle: ElementRef) -> Self {
        Self::Handle(handle)
    }
}

impl From<Option<Element>> for StepTarget {
    fn from(el: Option<Element>) -> Self {
        el.map_or(Self::Pending, Self::Element)
    }
}

/// One entry in a tour, as written by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDescriptor {
    pub target: StepTarget,
    pub popover: Popover,
    /// Only meaningful for collected steps.
    pub order: Option<i64>,
}

impl StepDescriptor {
    #[must_use]
    pub fn new(target: impl Into<StepTarget>) -> Self {
        Self {
            target: target.into(),
            popover: Popover::default(),
            order: None,
        }
    }

    /// A step with no target: a floating popover.
    #[must_use]
    pub fn pending() -> Self {
        Self::new(StepTarget::Pending)
    }

    #[must_use]
    pub fn with_popover(mut self, popover: Popover) -> Self {
        self.popover = popover;
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// A target the engine can use directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Selector(String),
    Element(Element),
}

/// Concrete step handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveStep {
    pub target: Option<ResolvedTarget>,
    pub popover: Popover,
}

impl DriveStep {
    #[must_use]
    pub fn new(target: ResolvedTarget, popover: Popover) -> Self {
        Self {
            target: Some(target),
            popover,
        }
    }
}

/// Where a tour gets its step list.
#[derive(Debug, Clone)]
pub enum StepSource {
    Static(Vec<StepDescriptor>),
    /// Re-read and re-resolved before every drive.
    Reactive(Observable<Vec<StepDescriptor>>),
    /// Discovered from markers under the mounted root.
    Collected,
}

impl From<Vec<StepDescriptor>> for StepSource {
    fn from(steps: Vec<StepDescriptor>) -> Self {
        Self::Static(steps)
    }
}
