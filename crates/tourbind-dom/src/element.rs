#![forbid(unsafe_code)]

//! Live element handles.
//!
//! An [`Element`] is a cheap, cloneable handle to a node in a mutable tree.
//! Identity is pointer identity: two handles are equal only when they refer
//! to the same node, which is what a highlighted "active element" means.
//! Parents are held weakly, so dropping the last handle to a detached
//! subtree frees it even while children still point upward.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::selector::{Selector, SelectorError};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identifier, handy for logs.
pub type NodeId = u64;

struct Node {
    id: NodeId,
    tag: String,
    attributes: RefCell<Vec<(String, String)>>,
    children: RefCell<Vec<Element>>,
    parent: RefCell<Weak<Node>>,
}

/// Handle to a node in a live element tree.
#[derive(Clone)]
pub struct Element {
    node: Rc<Node>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Element {}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("node_id", &self.node.id).field("tag", &self.node.tag);
        if let Some(id) = self.get_attribute("id") {
            s.field("id", &id);
        }
        s.finish()
    }
}

impl Element {
    /// Create a detached element with the given tag name (lowercased).
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            node: Rc::new(Node {
                id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
                tag: tag.into().to_ascii_lowercase(),
                attributes: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
            }),
        }
    }

    /// Builder form of [`set_attribute`](Self::set_attribute).
    #[must_use]
    pub fn with_attr(self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder form of [`append_child`](Self::append_child).
    #[must_use]
    pub fn with_child(self, child: Element) -> Self {
        self.append_child(&child);
        self
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.node.tag
    }

    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.node
            .attributes
            .borrow()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.node.attributes.borrow().iter().any(|(k, _)| k == name)
    }

    /// Set an attribute, keeping its original position if it already exists.
    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut attrs = self.node.attributes.borrow_mut();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute. Returns its previous value.
    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        let mut attrs = self.node.attributes.borrow_mut();
        let pos = attrs.iter().position(|(k, _)| k == name)?;
        Some(attrs.remove(pos).1)
    }

    /// Attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.node.attributes.borrow().clone()
    }

    /// Whether the `class` attribute lists `class`.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        self.node.parent.borrow().upgrade().map(|node| Element { node })
    }

    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.node.children.borrow().clone()
    }

    /// Append `child`, detaching it from any previous parent first.
    ///
    /// Appending an ancestor of `self` would create a cycle and is ignored.
    pub fn append_child(&self, child: &Element) {
        if child == self || child.contains(self) {
            tracing::debug!(
                parent = self.node.id,
                child = child.node.id,
                "refusing to append an ancestor"
            );
            return;
        }
        child.detach();
        *child.node.parent.borrow_mut() = Rc::downgrade(&self.node);
        self.node.children.borrow_mut().push(child.clone());
    }

    /// Remove this element from its parent, if any.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent.node.children.borrow_mut().retain(|c| c != self);
        *self.node.parent.borrow_mut() = Weak::new();
    }

    /// Whether `other` is `self` or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &Element) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(el) = cursor {
            if &el == self {
                return true;
            }
            cursor = el.parent();
        }
        false
    }

    /// Ancestors from the parent up to the root.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut cursor = self.parent();
        while let Some(el) = cursor {
            cursor = el.parent();
            out.push(el);
        }
        out
    }

    /// All descendants in document order (pre-order), excluding `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(el) = stack.pop() {
            stack.extend(el.children().into_iter().rev());
            out.push(el);
        }
        out
    }

    /// First descendant matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.descendants().into_iter().find(|el| selector.matches(el)))
    }

    /// Every descendant matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants()
            .into_iter()
            .filter(|el| selector.matches(el))
            .collect())
    }

    /// Whether this element matches `selector`.
    pub fn matches(&self, selector: &str) -> Result<bool, SelectorError> {
        Ok(Selector::parse(selector)?.matches(self))
    }
}
