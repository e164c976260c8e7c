#![forbid(unsafe_code)]

//! Configuration for the engine's display options and for the bridge itself.
//!
//! [`TourConfig`] is forwarded to the engine on every `set_config`; its
//! defaults are the engine's documented defaults. [`BridgeConfig`] governs
//! how the bridge mirrors and resolves. Both load from JSON, and from TOML
//! with the `config-file` feature:
//!
//! ```toml
//! poll_interval_ms = 100
//! sync = "push"
//! resolution = "on_mount"
//!
//! [tour]
//! show_progress = true
//! overlay_opacity = 0.5
//! ```

#[cfg(feature = "config-file")]
use std::path::Path;

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::step::PopoverButton;

/// Cadence used by the polling mirror unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// What a click on the overlay does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayClick {
    #[default]
    Close,
    NextStep,
}

/// Display options forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    pub animate: bool,
    pub overlay_color: String,
    pub overlay_opacity: f32,
    pub overlay_click: OverlayClick,
    pub smooth_scroll: bool,
    pub allow_close: bool,
    pub allow_keyboard_control: bool,
    pub disable_active_interaction: bool,
    pub stage_padding: u32,
    pub stage_radius: u32,
    pub popover_offset: u32,
    pub popover_class: Option<String>,
    pub show_buttons: Vec<PopoverButton>,
    pub disable_buttons: Vec<PopoverButton>,
    pub show_progress: bool,
    /// Supports `{{current}}` and `{{total}}` placeholders.
    pub progress_text: String,
    pub next_btn_text: String,
    pub prev_btn_text: String,
    pub done_btn_text: String,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            animate: true,
            overlay_color: "#000".into(),
            overlay_opacity: 0.7,
            overlay_click: OverlayClick::Close,
            smooth_scroll: false,
            allow_close: true,
            allow_keyboard_control: true,
            disable_active_interaction: false,
            stage_padding: 10,
            stage_radius: 5,
            popover_offset: 10,
            popover_class: None,
            show_buttons: vec![
                PopoverButton::Next,
                PopoverButton::Previous,
                PopoverButton::Close,
            ],
            disable_buttons: Vec::new(),
            show_progress: false,
            progress_text: "{{current}} of {{total}}".into(),
            next_btn_text: "Next &rarr;".into(),
            prev_btn_text: "&larr; Previous".into(),
            done_btn_text: "Done".into(),
        }
    }
}

impl TourConfig {
    /// Render `progress_text` for a 0-based `index` out of `total` steps.
    #[must_use]
    pub fn progress_label(&self, index: usize, total: usize) -> String {
        self.progress_text
            .replace("{{current}}", &(index + 1).to_string())
            .replace("{{total}}", &total.to_string())
    }
}

/// How the state mirror learns about engine changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Re-read the engine on a fixed cadence.
    #[default]
    Poll,
    /// Re-read whenever the engine reports a change.
    Push,
}

/// When lazy and reactive step targets are turned into concrete ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTiming {
    /// Resolve the step list immediately before every `drive`.
    #[default]
    BeforeDrive,
    /// Resolve once when the owning scope mounts and reuse the result.
    /// Reactive step lists are always resolved before each `drive`.
    OnMount,
}

/// Bridge behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub poll_interval_ms: u64,
    pub sync: SyncMode,
    pub resolution: ResolutionTiming,
    /// Start the tour from step 0 as soon as the owning scope mounts.
    pub auto_run: bool,
    pub tour: TourConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            sync: SyncMode::Poll,
            resolution: ResolutionTiming::BeforeDrive,
            auto_run: false,
            tour: TourConfig::default(),
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validated()
    }

    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validated()
    }

    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Range checks. An empty list means the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be > 0".into());
        }
        let opacity = self.tour.overlay_opacity;
        if !(0.0..=1.0).contains(&opacity) {
            errors.push(format!("tour.overlay_opacity must be in [0, 1], got {opacity}"));
        }
        errors
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[cfg(feature = "config-file")]
    #[error("TOML parse error: {0}")]
    Toml(#[source] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[source] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
