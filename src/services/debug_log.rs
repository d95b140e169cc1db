//! Bounded in-memory log of recent payment events.
//!
//! Fed by a `tracing_subscriber` layer and surfaced in error responses so a
//! failed request can be diagnosed from the client side.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const DEFAULT_CAPACITY: usize = 200;
pub const RESPONSE_TAIL: usize = 20;

#[derive(Clone)]
pub struct DebugLog {
    capacity: usize,
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DebugLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.max(1)))),
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// The most recent `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layer(&self) -> DebugLogLayer {
        DebugLogLayer {
            log: self.clone(),
            target_prefix: env!("CARGO_CRATE_NAME"),
        }
    }
}

/// Records events emitted by this crate at DEBUG or above.
pub struct DebugLogLayer {
    log: DebugLog,
    target_prefix: &'static str,
}

impl<S: Subscriber> Layer<S> for DebugLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::DEBUG || !meta.target().starts_with(self.target_prefix) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.log.push(format!(
            "{} {} {}{}",
            Utc::now().format("%H:%M:%S%.3f"),
            meta.level(),
            visitor.message,
            visitor.fields
        ));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn ring_buffer_drops_oldest() {
        let log = DebugLog::new(3);
        for i in 0..5 {
            log.push(format!("line {}", i));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.tail(10), vec!["line 2", "line 3", "line 4"]);
        assert_eq!(log.tail(1), vec!["line 4"]);
    }

    #[test]
    fn layer_captures_crate_events() {
        let log = DebugLog::new(10);
        let subscriber = tracing_subscriber::registry().with(log.layer());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(reference = "DEP-1", "Payment initiated");
            tracing::trace!("too chatty");
            tracing::info!(target: "hyper::proto", "foreign event");
        });

        let lines = log.tail(10);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("INFO Payment initiated"));
        assert!(lines[0].contains("reference=DEP-1"));
    }
}
