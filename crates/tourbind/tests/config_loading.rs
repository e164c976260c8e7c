#![forbid(unsafe_code)]

//! Loaded configuration reaching the mirror cadence and the engine.

use tourbind::{
    BridgeConfig, ConfigError, Duration, EngineSource, EventLoop, OverlayClick, Scope, TourOptions,
    use_tour,
};
use tourbind_harness::{RecordingFactory, element_step};

const JSON: &str = r#"{
    "poll_interval_ms": 50,
    "tour": {
        "overlay_click": "next_step",
        "show_progress": true,
        "progress_text": "Step {{current}} / {{total}}"
    }
}"#;

#[test]
fn json_config_drives_cadence_and_engine_options() {
    let config = BridgeConfig::from_json_str(JSON).unwrap();
    let engines = RecordingFactory::new();
    let ev = EventLoop::new();
    let scope = Scope::new();
    let (_, a) = element_step("a");
    let tour = scope
        .setup(|| {
            use_tour(
                TourOptions::new(EngineSource::Scoped(engines.factory()), ev.clone())
                    .steps(vec![a])
                    .config(config),
            )
        })
        .unwrap();
    tour.drive(None).unwrap();

    let syncs = tour.mirror().sync_count();
    ev.advance(Duration::from_millis(200));
    assert_eq!(tour.mirror().sync_count(), syncs + 4);

    let tour_config = engines.last().unwrap().configured_tour();
    assert_eq!(tour_config.overlay_click, OverlayClick::NextStep);
    assert!(tour_config.show_progress);
    assert_eq!(tour_config.progress_label(1, 4), "Step 2 / 4");
}

#[test]
fn malformed_json_is_a_parse_error() {
    assert!(matches!(
        BridgeConfig::from_json_str("{ poll_interval_ms: }"),
        Err(ConfigError::Json(_))
    ));
}

#[cfg(feature = "config-file")]
#[test]
fn toml_file_with_invalid_values_reports_every_problem() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "poll_interval_ms = 0\n\n[tour]\noverlay_opacity = -0.5").unwrap();
    match BridgeConfig::from_toml_file(file.path()) {
        Err(ConfigError::Validation(problems)) => assert_eq!(problems.len(), 2),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[cfg(feature = "config-file")]
#[test]
fn missing_toml_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        BridgeConfig::from_toml_file(dir.path().join("absent.toml")),
        Err(ConfigError::Io(_))
    ));
}
