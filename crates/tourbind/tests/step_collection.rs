#![forbid(unsafe_code)]

//! Declarative step discovery end to end: directives write markers, the
//! collector reads them back in two-tier order, and the `Tour` component
//! drives whatever it found.
//!
//! Run:
//!   cargo test -p tourbind --test step_collection

use std::rc::Rc;

use serde_json::json;
use tourbind::{
    DirectiveBinding, DirectiveRegistry, EngineRegistry, EngineSource, EventLoop, ORDER_MARKER,
    POPOVER_MARKER, ResolvedTarget, StepTarget, Tour, TourError, TourOptions, collect,
    install_directives,
};
use tourbind_dom::Element;
use tourbind_harness::{EngineCall, RecordingFactory, capture_logs};

fn directives() -> DirectiveRegistry {
    let mut registry = DirectiveRegistry::new();
    install_directives(
        &mut registry,
        Rc::new(EngineRegistry::new(RecordingFactory::new().factory())),
    );
    registry
}

fn mark(registry: &DirectiveRegistry, title: &str, arg: Option<&str>) -> Element {
    let el = Element::new("div").with_attr("id", title);
    let mut binding = DirectiveBinding::new(json!({ "title": title }));
    if let Some(arg) = arg {
        binding = binding.with_arg(arg);
    }
    registry.mounted("step", &el, &binding).unwrap();
    el
}

fn targets(steps: &[tourbind::StepDescriptor]) -> Vec<Element> {
    steps
        .iter()
        .map(|s| match &s.target {
            StepTarget::Element(el) => el.clone(),
            other => panic!("collected step has non-element target {other:?}"),
        })
        .collect()
}

#[test]
fn mixed_orders_sort_ordered_first_then_document_order() {
    let registry = directives();
    let ((first, second, third, fourth, steps), logs) = capture_logs(|| {
        let first = mark(&registry, "first", Some("2"));
        let second = mark(&registry, "second", None);
        let third = mark(&registry, "third", Some("1"));
        let fourth = mark(&registry, "fourth", Some("x"));
        let root = Element::new("main")
            .with_child(first.clone())
            .with_child(second.clone())
            .with_child(third.clone())
            .with_child(fourth.clone());
        let steps = collect(&root).unwrap();
        (first, second, third, fourth, steps)
    });

    assert_eq!(targets(&steps), vec![third, first, second, fourth.clone()]);
    assert_eq!(
        steps.iter().map(|s| s.order).collect::<Vec<_>>(),
        vec![Some(1), Some(2), None, None]
    );
    assert!(!fourth.has_attribute(ORDER_MARKER));
    assert_eq!(
        logs.warning_messages(),
        vec!["Invalid step order x, not a number".to_string()]
    );
}

#[test]
fn raw_non_numeric_order_marker_is_kept_unordered_with_warning() {
    let a = Element::new("p")
        .with_attr(POPOVER_MARKER, r#"{"title":"a"}"#)
        .with_attr(ORDER_MARKER, "soon");
    let b = Element::new("p")
        .with_attr(POPOVER_MARKER, r#"{"title":"b"}"#)
        .with_attr(ORDER_MARKER, "0");
    let root = Element::new("main").with_child(a.clone()).with_child(b.clone());

    let (steps, logs) = capture_logs(|| collect(&root).unwrap());
    assert_eq!(targets(&steps), vec![b, a]);
    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field("order"), Some("soon"));
}

#[test]
fn markers_with_unmodelled_values_are_collected() {
    let registry = directives();
    let plain = mark(&registry, "plain", None);
    let odd = Element::new("div");
    registry
        .mounted(
            "step",
            &odd,
            &DirectiveBinding::new(json!({ "title": 5, "side": "middle", "showButtons": ["skip"] })),
        )
        .unwrap();
    let root = Element::new("main").with_child(plain.clone()).with_child(odd.clone());

    let steps = collect(&root).unwrap();
    assert_eq!(targets(&steps), vec![plain, odd]);
    let extra = &steps[1].popover.extra;
    assert_eq!(extra.get("title"), Some(&json!(5)));
    assert_eq!(extra.get("side"), Some(&json!("middle")));
    assert_eq!(extra.get("showButtons"), Some(&json!(["skip"])));
}

#[test]
fn malformed_marker_aborts_collection() {
    let root = Element::new("main").with_child(
        Element::new("p").with_attr(POPOVER_MARKER, "not json"),
    );
    assert!(matches!(
        collect(&root),
        Err(TourError::MalformedMarker { .. })
    ));
}

#[test]
fn tour_component_drives_collected_steps() {
    let registry = directives();
    let engines = RecordingFactory::new();
    let tour = Tour::new(TourOptions::new(
        EngineSource::Scoped(engines.factory()),
        EventLoop::new(),
    ))
    .unwrap();

    let intro = mark(&registry, "intro", Some("1"));
    let outro = mark(&registry, "outro", None);
    let root = Element::new("section")
        .with_child(outro.clone())
        .with_child(Element::new("div").with_child(intro.clone()));
    tour.mount(root);
    tour.drive(None).unwrap();

    let engine = engines.last().unwrap();
    let configured: Vec<_> = engine
        .configured_steps()
        .into_iter()
        .map(|s| s.target)
        .collect();
    assert_eq!(
        configured,
        vec![
            Some(ResolvedTarget::Element(intro)),
            Some(ResolvedTarget::Element(outro)),
        ]
    );
    assert_eq!(engine.calls().last(), Some(&EngineCall::Drive(0)));
}

#[test]
fn tour_with_malformed_marker_does_not_touch_engine() {
    let engines = RecordingFactory::new();
    let tour = Tour::new(TourOptions::new(
        EngineSource::Scoped(engines.factory()),
        EventLoop::new(),
    ))
    .unwrap();
    tour.mount(Element::new("section").with_child(Element::new("p").with_attr(POPOVER_MARKER, "{")));

    assert!(tour.drive(None).is_err());
    assert!(engines.last().unwrap().calls().is_empty());
    assert!(!tour.handle().mirror().is_running());
}

#[test]
fn dropping_the_component_destroys_its_engine() {
    let engines = RecordingFactory::new();
    {
        let tour = Tour::new(TourOptions::new(
            EngineSource::Scoped(engines.factory()),
            EventLoop::new(),
        ))
        .unwrap();
        tour.mount(Element::new("section"));
    }
    assert_eq!(engines.last().unwrap().destroy_calls(), 1);
}
