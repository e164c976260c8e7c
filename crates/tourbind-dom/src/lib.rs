#![forbid(unsafe_code)]

//! `tourbind-dom` is the element tree the tour bridge works against.
//!
//! It stands in for a browser DOM: live, mutable, single-threaded nodes
//! with string attributes, document-order traversal, and enough selector
//! support for step targets such as `#save-button` or `.toolbar [data-x]`.

pub mod element;
pub mod selector;

pub use element::{Element, NodeId};
pub use selector::{Selector, SelectorError};
