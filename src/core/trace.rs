//! Trace sinks for the `trace()` function

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use super::collection::Collection;

/// Sink for `trace(name, projection?)` output.
///
/// The default context routes traces through the `log` facade; hosts that
/// want to capture traces (servers, test harnesses) install their own
/// implementation via the context builder. Implementations must be
/// thread-safe when a context is shared across threads.
pub trait Tracer: Send + Sync {
    /// Record one trace event. `collection` is the traced (possibly
    /// projected) collection at the point of the call.
    fn trace(&self, name: &str, collection: &Collection);
}

/// Default tracer: emits each trace as an `info`-level log record.
#[derive(Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, name: &str, collection: &Collection) {
        let mut rendered = String::new();
        for (i, value) in collection.iter().enumerate() {
            if i > 0 {
                rendered.push_str(", ");
            }
            let _ = write!(rendered, "{value}");
        }
        log::info!(target: "fhirpath::trace", "TRACE[{name}] [{rendered}]");
    }
}

/// Tracer that retains every event, used by tests and the CLI `--trace` flag.
#[derive(Debug, Default)]
pub struct CollectingTracer {
    events: Mutex<Vec<(String, Collection)>>,
}

impl CollectingTracer {
    /// Create an empty collecting tracer
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drain all recorded events in call order
    pub fn take(&self) -> Vec<(String, Collection)> {
        std::mem::take(&mut self.events.lock())
    }
}

impl Tracer for CollectingTracer {
    fn trace(&self, name: &str, collection: &Collection) {
        self.events.lock().push((name.to_string(), collection.clone()));
    }
}
