//! Tracing setup and the in-memory log history.
//!
//! [`LogHistory`] is a [`Layer`] that keeps the most recent events in a
//! bounded ring so the shell can show what just happened. It is an
//! ordinary value owned by the application context; several isolated
//! histories can coexist, one per subscriber.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::subscription::lock;

/// One captured log event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// `TRACE` through `ERROR`.
    pub level: String,
    /// The `scope` field when present, otherwise the event target.
    pub scope: String,
    /// The event message.
    pub message: String,
    /// Remaining structured fields.
    pub fields: Map<String, Value>,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Bounded history of recent log events.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone)]
pub struct LogHistory {
    records: Arc<Mutex<VecDeque<LogRecord>>>,
    capacity: usize,
}

impl LogHistory {
    /// A history retaining at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Oldest-first copy of the retained records.
    pub fn records(&self) -> Vec<LogRecord> {
        lock(&self.records).iter().cloned().collect()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Maximum number of retained records.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `record`, evicting the oldest one when full.
    pub fn push(&self, record: LogRecord) {
        let mut records = lock(&self.records);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

impl<S: Subscriber> Layer<S> for LogHistory {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let scope = match visitor.fields.remove("scope") {
            Some(Value::String(scope)) => scope,
            Some(other) => other.to_string(),
            None => metadata.target().to_owned(),
        };

        self.push(LogRecord {
            level: metadata.level().to_string(),
            scope,
            message: visitor.message,
            fields: visitor.fields,
            timestamp: Utc::now(),
        });
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(message) => message,
                other => other.to_string(),
            };
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}

/// Install the global subscriber: an [`EnvFilter`] (`RUST_LOG`, falling
/// back to `config.level`), the fmt layer, and `history`.
pub fn init_tracing(config: &LoggingConfig, history: &LogHistory) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(history.clone())
        .try_init()
}
