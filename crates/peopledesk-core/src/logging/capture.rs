//! Thread-local capture of `tracing` events, for tests that assert on what
//! was logged.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedEvent {
    /// Event level.
    pub level: Level,
    /// Emitting module path.
    pub target: String,
    /// The event message.
    pub message: String,
    /// Other fields, rendered, in recording order.
    pub fields: Vec<(&'static str, String)>,
}

impl CapturedEvent {
    /// Rendered value of field `name`. Strings are unquoted.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|(k, v)| (*k == name).then_some(v.as_str()))
    }
}

/// Handle on the events captured by [`capture_logs`].
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl fmt::Debug for CapturedLogs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapturedLogs").field(&self.0.lock().len()).finish()
    }
}

impl CapturedLogs {
    /// Everything captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().clone()
    }

    /// First event at `level` whose message contains `text`.
    pub fn find(&self, level: Level, text: &str) -> Option<CapturedEvent> {
        self.0
            .lock()
            .iter()
            .find(|e| e.level == level && e.message.contains(text))
            .cloned()
    }

    /// Whether an event at `level` mentions `text`.
    pub fn has_event(&self, level: Level, text: &str) -> bool {
        self.find(level, text).is_some()
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    rest: Vec<(&'static str, String)>,
}

impl Fields {
    fn put(&mut self, field: &Field, rendered: String) {
        match field.name() {
            "message" => self.message = rendered,
            name => self.rest.push((name, rendered)),
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct Recorder(CapturedLogs);

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let meta = event.metadata();
        self.0.0.lock().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: fields.message,
            fields: fields.rest,
        });
    }
}

/// Capture every event emitted on the current thread until the guard drops.
///
/// Work moved to other threads (`spawn_blocking`, multi-thread runtimes)
/// is not seen.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(Recorder(logs.clone()))
        .set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_message_and_fields() {
        let (logs, _guard) = capture_logs();
        tracing::warn!(store = "memory:hr", holders = 2_u64, "blocked by other open sessions");

        let event = logs.find(Level::WARN, "blocked").unwrap();
        assert_eq!(event.field("holders"), Some("2"));
        assert_eq!(event.field("store"), Some("memory:hr"));
        assert_eq!(event.field("missing"), None);
    }

    #[test]
    fn level_must_match() {
        let (logs, _guard) = capture_logs();
        tracing::info!("database opened");

        assert!(logs.has_event(Level::INFO, "opened"));
        assert!(!logs.has_event(Level::WARN, "opened"));
        assert_eq!(logs.events().len(), 1);
    }

    #[test]
    fn other_threads_are_not_captured() {
        let (logs, _guard) = capture_logs();
        std::thread::spawn(|| tracing::error!("elsewhere")).join().unwrap();
        assert!(logs.events().is_empty());
    }
}
