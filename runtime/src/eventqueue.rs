//! Event queue: a bounded, thread-safe FIFO of hash-shaped event payloads,
//! the mechanism datasource pools and other long-lived objects use to
//! surface diagnostic/lifecycle events (`"connection-opened"`,
//! `"lock-contended"`, ...) to an embedder that chooses to poll for them.
//!
//! Built directly on [`crate::locks::Queue`] — an event queue is just a
//! `Queue<Value>` with a constructor that always produces hash-shaped
//! values and a name, not a new concurrency primitive.

use crate::hash::OrderedHash;
use crate::locks::Queue;
use crate::value::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct EventQueue {
    queue: Queue<Value>,
}

impl EventQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            queue: Queue::new(capacity),
        }
    }

    /// Push an event hash: `{"event": event_name, "timestamp": <epoch
    /// seconds>, "source": source_name, "info": info}`.
    pub fn push_event(&self, event_name: &str, source_name: &str, info: Value) {
        let mut h = OrderedHash::new();
        h.insert("event".to_string(), Value::Str(crate::strings::RuneString::from_str(event_name)));
        h.insert("source".to_string(), Value::Str(crate::strings::RuneString::from_str(source_name)));
        h.insert("timestamp".to_string(), Value::Int(now_epoch_seconds()));
        h.insert("info".to_string(), info);
        self.queue.push(Value::Hash(Arc::new(h)));
    }

    /// Block until an event is available and return it.
    pub fn pop_event(&self) -> Value {
        self.queue.pop()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
