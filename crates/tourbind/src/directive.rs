#![forbid(unsafe_code)]

//! Element directives: imperative hooks the host runs on element mount and
//! update.
//!
//! - `step` writes the marker attributes read by [`collect`](crate::collect::collect).
//! - `highlight` asks the shared engine to highlight the element.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tourbind_dom::Element;
use tracing::{trace, warn};

use crate::collect::{ORDER_MARKER, POPOVER_MARKER, parse_order};
use crate::error::{Result, TourError};
use crate::lifecycle::EngineRegistry;
use crate::step::{DriveStep, Popover, ResolvedTarget};

/// Value and argument bound to a directive use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveBinding {
    pub value: Value,
    pub arg: Option<String>,
}

impl DirectiveBinding {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value, arg: None }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }
}

pub trait Directive {
    fn name(&self) -> &'static str;

    fn mounted(&self, el: &Element, binding: &DirectiveBinding) -> Result<()>;

    fn updated(&self, el: &Element, binding: &DirectiveBinding) -> Result<()> {
        self.mounted(el, binding)
    }
}

fn parse_binding<T: DeserializeOwned>(directive: &'static str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|source| TourError::MalformedBinding { directive, source })
}

/// Marks an element as a declarative tour step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepDirective;

impl Directive for StepDirective {
    fn name(&self) -> &'static str {
        "step"
    }

    fn mounted(&self, el: &Element, binding: &DirectiveBinding) -> Result<()> {
        let popover: Popover = parse_binding("step", &binding.value)?;
        let marker = popover
            .to_json()
            .map_err(|source| TourError::MalformedBinding {
                directive: "step",
                source,
            })?;
        el.set_attribute(POPOVER_MARKER, marker);

        let Some(arg) = binding.arg.as_deref() else {
            return Ok(());
        };
        match parse_order(arg) {
            Some(order) => el.set_attribute(ORDER_MARKER, order.to_string()),
            None => {
                warn!(order = %arg, "Invalid step order {arg}, not a number");
                el.remove_attribute(ORDER_MARKER);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct HighlightBinding {
    #[serde(default = "enabled")]
    active: bool,
    #[serde(flatten)]
    popover: Popover,
}

fn enabled() -> bool {
    true
}

/// Highlights the bound element on the shared engine.
#[derive(Debug, Clone)]
pub struct HighlightDirective {
    engines: Rc<EngineRegistry>,
}

impl HighlightDirective {
    #[must_use]
    pub fn new(engines: Rc<EngineRegistry>) -> Self {
        Self { engines }
    }
}

impl Directive for HighlightDirective {
    fn name(&self) -> &'static str {
        "highlight"
    }

    fn mounted(&self, el: &Element, binding: &DirectiveBinding) -> Result<()> {
        let binding: HighlightBinding = parse_binding("highlight", &binding.value)?;
        if !binding.active {
            trace!(node_id = el.node_id(), "highlight suppressed");
            return Ok(());
        }
        let engine = self.engines.get_or_acquire();
        engine.highlight(DriveStep::new(
            ResolvedTarget::Element(el.clone()),
            binding.popover,
        ));
        Ok(())
    }
}

/// Directives by name.
#[derive(Default)]
pub struct DirectiveRegistry {
    directives: BTreeMap<&'static str, Rc<dyn Directive>>,
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.directives.keys()).finish()
    }
}

impl DirectiveRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the directive's own name, replacing any previous one.
    pub fn register(&mut self, directive: Rc<dyn Directive>) {
        self.directives.insert(directive.name(), directive);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<dyn Directive>> {
        self.directives.get(name).cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.directives.keys().copied().collect()
    }

    fn lookup(&self, name: &str) -> Result<Rc<dyn Directive>> {
        self.get(name).ok_or_else(|| TourError::UnknownDirective {
            name: name.to_string(),
        })
    }

    pub fn mounted(&self, name: &str, el: &Element, binding: &DirectiveBinding) -> Result<()> {
        self.lookup(name)?.mounted(el, binding)
    }

    pub fn updated(&self, name: &str, el: &Element, binding: &DirectiveBinding) -> Result<()> {
        self.lookup(name)?.updated(el, binding)
    }
}

/// Register the `step` and `highlight` directives.
pub fn install_directives(registry: &mut DirectiveRegistry, engines: Rc<EngineRegistry>) {
    registry.register(Rc::new(StepDirective));
    registry.register(Rc::new(HighlightDirective::new(engines)));
}
