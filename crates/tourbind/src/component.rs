#![forbid(unsafe_code)]

//! The `Tour` component: a scope of its own plus a tour whose steps default
//! to the markers found under its rendered root.

use tourbind_dom::Element;

use crate::composable::{TourHandle, TourOptions, use_tour};
use crate::error::Result;
use crate::expose::ExposedApi;
use crate::scope::Scope;
use crate::step::{StepDescriptor, StepSource};

#[derive(Debug)]
pub struct Tour {
    scope: Scope,
    handle: TourHandle,
}

impl Tour {
    /// Set up the component. Without explicit steps, the tour collects
    /// marked descendants of the root passed to [`mount`](Self::mount).
    pub fn new(mut options: TourOptions) -> Result<Self> {
        if options.steps.is_none() {
            options.steps = Some(StepSource::Collected);
        }
        let scope = Scope::new();
        let handle = scope.setup(|| use_tour(options))?;
        Ok(Self { scope, handle })
    }

    pub fn mount(&self, root: Element) {
        self.scope.mount(root);
    }

    pub fn unmount(&self) {
        self.scope.unmount();
    }

    #[must_use]
    pub fn handle(&self) -> &TourHandle {
        &self.handle
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn drive(&self, step_index: Option<usize>) -> Result<()> {
        self.handle.drive(step_index)
    }

    pub fn highlight(&self, step: &StepDescriptor) -> Result<()> {
        self.handle.highlight(step)
    }

    /// Call surface handed to parents holding a reference to the component.
    pub fn expose(&self) -> Result<ExposedApi> {
        self.handle.api()
    }
}

impl Drop for Tour {
    fn drop(&mut self) {
        self.scope.unmount();
    }
}
