#![forbid(unsafe_code)]

//! Declarative step discovery.
//!
//! Elements under a mounted root declare themselves as tour steps through
//! two marker attributes: [`POPOVER_MARKER`] holds the JSON popover and
//! [`ORDER_MARKER`] an optional integer position. Ordered steps come first,
//! ascending, with ties kept in document order; unordered ones follow in
//! document order.
//!
//! Any JSON object is a valid popover. Only unparsable JSON or a non-object
//! value fails the pass.

use tourbind_dom::Element;
use tracing::{trace, warn};

use crate::error::{Result, TourError};
use crate::step::{Popover, StepDescriptor, StepTarget};

pub const POPOVER_MARKER: &str = "driver-step-popover";
pub const ORDER_MARKER: &str = "driver-step-order";

/// Parse an order marker value. Surrounding whitespace is ignored.
#[must_use]
pub fn parse_order(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Collect marked descendants of `root` (the root itself is not a step).
///
/// A popover marker that is not a JSON object fails the whole pass.
pub fn collect(root: &Element) -> Result<Vec<StepDescriptor>> {
    let mut ordered: Vec<(i64, StepDescriptor)> = Vec::new();
    let mut unordered: Vec<StepDescriptor> = Vec::new();

    for el in root.descendants() {
        let Some(raw) = el.get_attribute(POPOVER_MARKER) else {
            continue;
        };
        let popover: Popover =
            serde_json::from_str(&raw).map_err(|source| TourError::MalformedMarker {
                node_id: el.node_id(),
                value: raw.clone(),
                source,
            })?;
        let descriptor = StepDescriptor {
            target: StepTarget::Element(el.clone()),
            popover,
            order: None,
        };

        match el.get_attribute(ORDER_MARKER) {
            None => unordered.push(descriptor),
            Some(raw_order) => match parse_order(&raw_order) {
                Some(order) => ordered.push((order, descriptor.with_order(order))),
                None => {
                    warn!(
                        order = %raw_order,
                        node_id = el.node_id(),
                        "Invalid step order {raw_order}, not a number; step kept unordered"
                    );
                    unordered.push(descriptor);
                }
            },
        }
    }

    // Stable: equal orders keep document order.
    ordered.sort_by_key(|(order, _)| *order);
    trace!(
        ordered = ordered.len(),
        unordered = unordered.len(),
        "collected declarative steps"
    );
    Ok(ordered
        .into_iter()
        .map(|(_, descriptor)| descriptor)
        .chain(unordered)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(title: &str, order: Option<&str>) -> Element {
        let el = Element::new("div").with_attr(POPOVER_MARKER, format!(r#"{{"title":"{title}"}}"#));
        match order {
            Some(order) => el.with_attr(ORDER_MARKER, order),
            None => el,
        }
    }

    fn titles(steps: &[StepDescriptor]) -> Vec<String> {
        steps
            .iter()
            .map(|s| s.popover.title.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn parse_order_accepts_integers_only() {
        assert_eq!(parse_order("3"), Some(3));
        assert_eq!(parse_order(" -2 "), Some(-2));
        assert_eq!(parse_order("x"), None);
        assert_eq!(parse_order("1.5"), None);
        assert_eq!(parse_order(""), None);
    }

    #[test]
    fn nested_markers_in_document_order() {
        let inner = marked("inner", None);
        let outer = marked("outer", None).with_child(inner);
        let root = Element::new("main")
            .with_child(outer)
            .with_child(Element::new("p"))
            .with_child(marked("last", None));
        assert_eq!(titles(&collect(&root).unwrap()), ["outer", "inner", "last"]);
    }

    #[test]
    fn ties_keep_document_order() {
        let root = Element::new("main")
            .with_child(marked("b", Some("1")))
            .with_child(marked("c", Some("1")))
            .with_child(marked("a", Some("0")));
        let steps = collect(&root).unwrap();
        assert_eq!(titles(&steps), ["a", "b", "c"]);
        assert_eq!(steps[1].order, Some(1));
    }

    #[test]
    fn root_is_not_collected() {
        let root = marked("root", None).with_child(marked("child", None));
        assert_eq!(titles(&collect(&root).unwrap()), ["child"]);
    }

    #[test]
    fn any_json_object_is_a_valid_marker() {
        let odd = Element::new("div").with_attr(POPOVER_MARKER, r#"{"title":"A","side":"middle"}"#);
        let numeric = Element::new("div").with_attr(POPOVER_MARKER, r#"{"title":5}"#);
        let root = Element::new("main")
            .with_child(marked("ok", None))
            .with_child(odd)
            .with_child(numeric);
        let steps = collect(&root).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].popover.title.as_deref(), Some("A"));
        assert_eq!(
            steps[1].popover.extra.get("side"),
            Some(&serde_json::Value::from("middle"))
        );
        assert_eq!(steps[2].popover.extra.get("title"), Some(&serde_json::Value::from(5)));
    }

    #[test]
    fn non_object_marker_fails_the_pass() {
        let root = Element::new("main").with_child(Element::new("div").with_attr(POPOVER_MARKER, "[]"));
        assert!(matches!(collect(&root), Err(TourError::MalformedMarker { .. })));
    }

    #[test]
    fn malformed_popover_fails_the_pass() {
        let bad = Element::new("div").with_attr(POPOVER_MARKER, "{title:");
        let root = Element::new("main")
            .with_child(marked("ok", None))
            .with_child(bad.clone());
        match collect(&root) {
            Err(TourError::MalformedMarker { node_id, value, .. }) => {
                assert_eq!(node_id, bad.node_id());
                assert_eq!(value, "{title:");
            }
            other => panic!("expected malformed marker, got {other:?}"),
        }
    }
}
