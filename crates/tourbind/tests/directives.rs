#![forbid(unsafe_code)]

//! Directive registry against the shared engine.

use std::rc::Rc;

use serde_json::json;
use tourbind::{
    DirectiveBinding, DirectiveRegistry, EngineRegistry, Popover, ResolvedTarget, TourError,
    install_directives,
};
use tourbind_dom::Element;
use tourbind_harness::{EngineCall, RecordingFactory};

fn installed() -> (DirectiveRegistry, Rc<EngineRegistry>, RecordingFactory) {
    let engines = RecordingFactory::new();
    let shared = Rc::new(EngineRegistry::new(engines.factory()));
    let mut registry = DirectiveRegistry::new();
    install_directives(&mut registry, Rc::clone(&shared));
    (registry, shared, engines)
}

#[test]
fn install_registers_step_and_highlight() {
    let (registry, _, _) = installed();
    assert_eq!(registry.names(), vec!["highlight", "step"]);
}

#[test]
fn highlight_uses_the_live_singleton() {
    let (registry, shared, engines) = installed();
    let el = Element::new("button");

    registry
        .mounted("highlight", &el, &DirectiveBinding::new(json!({ "title": "Save" })))
        .unwrap();
    assert_eq!(engines.created(), 1);

    registry
        .updated(
            "highlight",
            &el,
            &DirectiveBinding::new(json!({ "title": "Saved", "description": "done" })),
        )
        .unwrap();
    assert_eq!(engines.created(), 1);
    assert_eq!(shared.generation(), 1);

    let calls = engines.last().unwrap().calls();
    assert_eq!(calls.len(), 2);
    match &calls[1] {
        EngineCall::Highlight(step) => {
            assert_eq!(step.target, Some(ResolvedTarget::Element(el)));
            assert_eq!(
                step.popover,
                Popover::titled("Saved").with_description("done")
            );
        }
        other => panic!("expected highlight, got {other:?}"),
    }
}

#[test]
fn inactive_highlight_is_a_no_op() {
    let (registry, _, engines) = installed();
    registry
        .mounted(
            "highlight",
            &Element::new("div"),
            &DirectiveBinding::new(json!({ "active": false, "title": "hidden" })),
        )
        .unwrap();
    assert_eq!(engines.created(), 0);
}

#[test]
fn unknown_directive_and_bad_binding_are_errors() {
    let (registry, _, _) = installed();
    let el = Element::new("div");
    assert!(matches!(
        registry.mounted("tooltip", &el, &DirectiveBinding::default()),
        Err(TourError::UnknownDirective { name }) if name == "tooltip"
    ));
    assert!(matches!(
        registry.mounted("step", &el, &DirectiveBinding::new(json!(["not", "an", "object"]))),
        Err(TourError::MalformedBinding { directive: "step", .. })
    ));
}
