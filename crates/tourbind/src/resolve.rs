#![forbid(unsafe_code)]

//! Step resolution: turning descriptors into steps the engine can drive.
//!
//! Selectors and direct elements pass through. Accessors run once, right
//! here, and their failures are fatal for the resolution pass. Reactive
//! handles are read at their current value; an unbound handle (and a
//! pending target) makes the step drop out with a warning naming its
//! position in the caller's list.

use tracing::warn;

use crate::error::{Result, TourError};
use crate::step::{DriveStep, ResolvedTarget, StepDescriptor, StepTarget};

/// Outcome of resolving one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(DriveStep),
    Skipped,
}

/// A resolved step list and the original positions that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSteps {
    pub steps: Vec<DriveStep>,
    pub skipped: Vec<usize>,
}

fn current_target(target: &StepTarget, index: usize) -> Result<Option<ResolvedTarget>> {
    Ok(match target {
        StepTarget::Selector(selector) => Some(ResolvedTarget::Selector(selector.clone())),
        StepTarget::Element(el) => Some(ResolvedTarget::Element(el.clone())),
        StepTarget::Accessor(accessor) => accessor()
            .map_err(|source| TourError::Accessor { index, source })?
            .map(ResolvedTarget::Element),
        StepTarget::Handle(handle) => handle.get().map(ResolvedTarget::Element),
        StepTarget::Pending => None,
    })
}

/// Resolve the descriptor at position `index` of its list.
pub fn resolve(descriptor: &StepDescriptor, index: usize) -> Result<Resolution> {
    match current_target(&descriptor.target, index)? {
        Some(target) => Ok(Resolution::Resolved(DriveStep::new(
            target,
            descriptor.popover.clone(),
        ))),
        None => {
            warn!(
                step_index = index,
                "Element in step index {index} is null after mount and will be skipped"
            );
            Ok(Resolution::Skipped)
        }
    }
}

/// Resolve a whole list, keeping the relative order of surviving steps.
///
/// The first accessor failure aborts the pass.
pub fn resolve_all(descriptors: &[StepDescriptor]) -> Result<ResolvedSteps> {
    let mut out = ResolvedSteps::default();
    for (index, descriptor) in descriptors.iter().enumerate() {
        match resolve(descriptor, index)? {
            Resolution::Resolved(step) => out.steps.push(step),
            Resolution::Skipped => out.skipped.push(index),
        }
    }
    Ok(out)
}

/// Resolve a one-off highlight target. `None` means there is nothing to show.
pub fn resolve_highlight(descriptor: &StepDescriptor) -> Result<Option<DriveStep>> {
    match current_target(&descriptor.target, 0)? {
        Some(target) => Ok(Some(DriveStep::new(target, descriptor.popover.clone()))),
        None => {
            warn!("Element in highlight is null");
            Ok(None)
        }
    }
}
