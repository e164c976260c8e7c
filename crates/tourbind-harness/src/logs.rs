#![forbid(unsafe_code)]

//! Tracing capture for asserting on warnings.

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

/// One captured event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, value.to_string());
    }
}

/// Layer collecting every event it sees.
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LogCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(captured);
        }
    }
}

/// Events captured by [`capture_logs`].
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    events: Vec<CapturedEvent>,
}

impl CapturedLogs {
    #[must_use]
    pub fn events(&self) -> &[CapturedEvent] {
        &self.events
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<&CapturedEvent> {
        self.events.iter().filter(|e| e.level == Level::WARN).collect()
    }

    /// Warning messages, in emission order.
    #[must_use]
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings().into_iter().map(|e| e.message.clone()).collect()
    }

    #[must_use]
    pub fn contains_warning(&self, needle: &str) -> bool {
        self.warnings().iter().any(|e| e.message.contains(needle))
    }
}

/// Run `f` with a thread-local subscriber that records every event.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = LogCapture {
        events: Arc::clone(&events),
    };
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    let out = tracing::subscriber::with_default(subscriber, f);
    let events = events.lock().map(|e| e.clone()).unwrap_or_default();
    (out, CapturedLogs { events })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_message_and_fields() {
        let ((), logs) = capture_logs(|| {
            tracing::debug!("quiet");
            tracing::warn!(step_index = 3u64, "Element in step index 3 is null");
        });
        assert_eq!(logs.events().len(), 2);
        let warning = logs.warnings()[0];
        assert_eq!(warning.message, "Element in step index 3 is null");
        assert_eq!(warning.field("step_index"), Some("3"));
        assert!(logs.contains_warning("step index 3"));
    }
}
