#![forbid(unsafe_code)]

use thiserror::Error;
use tourbind_dom::NodeId;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, TourError>;

/// Failures surfaced to callers of the bridge.
///
/// Non-fatal conditions (a null step target, a non-numeric order marker,
/// a failed destroy during replacement) are logged as warnings and never
/// appear here.
#[derive(Debug, Error)]
pub enum TourError {
    #[error("{entry} must be called within a component setup function")]
    Context { entry: &'static str },

    #[error("malformed step popover marker on node {node_id}: {value:?}")]
    MalformedMarker {
        node_id: NodeId,
        value: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("target accessor for step {index} failed")]
    Accessor {
        index: usize,
        #[source]
        source: TargetError,
    },

    #[error("operation not available: {name}")]
    OperationNotAvailable { name: String },

    #[error("tour engine instance not found")]
    EngineMissing,

    #[error("operation {operation} cannot take {given} arguments")]
    ArgumentMismatch {
        operation: &'static str,
        given: &'static str,
    },

    #[error("malformed binding for directive {directive}")]
    MalformedBinding {
        directive: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown directive: {name}")]
    UnknownDirective { name: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TourError {
    #[must_use]
    pub fn context(entry: &'static str) -> Self {
        Self::Context { entry }
    }

    #[must_use]
    pub fn not_available(name: impl Into<String>) -> Self {
        Self::OperationNotAvailable { name: name.into() }
    }
}

/// Failure reported by a tour engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("tour engine already destroyed")]
    AlreadyDestroyed,
    #[error("tour engine failure: {0}")]
    Failed(String),
}

/// Failure raised by a lazy step target accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TargetError {
    message: String,
}

impl TargetError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_message_is_fixed() {
        let error = TourError::context("use_tour");
        assert_eq!(
            error.to_string(),
            "use_tour must be called within a component setup function"
        );
    }

    #[test]
    fn accessor_error_keeps_source() {
        let error = TourError::Accessor {
            index: 2,
            source: TargetError::new("panel not rendered"),
        };
        let source = std::error::Error::source(&error).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("panel not rendered"));
    }

    #[test]
    fn engine_errors_pass_through() {
        let error: TourError = EngineError::Failed("overlay gone".into()).into();
        assert_eq!(error.to_string(), "tour engine failure: overlay gone");
    }
}
