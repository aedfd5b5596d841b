//! Non-blocking outbound event publication.
//!
//! The matching pipeline hands finished domain events to an
//! [`EventPublisher`]; the `enqueue` path is bounded-time and never blocks
//! the consumer thread. Actual transmission happens on a background worker
//! owned by the publisher implementation. Delivery is at-most-once from the
//! engine's perspective — the WAL holds the durable record.

mod nats;

pub use nats::NatsEventPublisher;

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// The outbound topics, keyed by symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// One record per emitted match result.
    Matches,
    /// One record per order placed (or rejected past the ring).
    Orders,
}

impl Topic {
    /// The wire name of the topic.
    #[must_use]
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Matches => "matches",
            Topic::Orders => "orders",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A serialized event queued for outbound delivery.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    /// Destination topic.
    pub topic: Topic,
    /// Partitioning key — the symbol.
    pub key: String,
    /// Serialized payload.
    pub payload: bytes::Bytes,
}

/// Errors surfaced by the non-blocking enqueue path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PublishError {
    /// The outbound buffer is saturated; the event is dropped and counted.
    QueueFull,
    /// The publisher has been closed.
    Closed,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::QueueFull => write!(f, "outbound publish queue full"),
            PublishError::Closed => write!(f, "publisher closed"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Abstraction over an external ordered event stream.
///
/// `enqueue` must be bounded-time (microseconds): when the outbound buffer
/// is saturated it returns an error immediately rather than blocking the
/// caller. `flush` is a batch-boundary hint; `close` drains and shuts down
/// the background worker.
pub trait EventPublisher: Send + Sync {
    /// Queue an event for background delivery without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::QueueFull`] or [`PublishError::Closed`]; the
    /// caller counts the error and proceeds.
    fn enqueue(&self, event: OutboundEvent) -> Result<(), PublishError>;

    /// Hint that a consumer batch just ended; implementations may wake their
    /// worker or flush transport buffers.
    fn flush(&self);

    /// Drain outstanding events and stop the background worker. Idempotent.
    fn close(&self);
}

/// An in-memory publisher that retains every event, used by tests and
/// diagnostics. The mutex is uncontended in the single-writer pattern.
#[derive(Debug, Default)]
pub struct BufferPublisher {
    events: Mutex<Vec<OutboundEvent>>,
}

impl BufferPublisher {
    /// Create an empty buffer publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events enqueued so far.
    #[must_use]
    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of events enqueued so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether no events were enqueued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventPublisher for BufferPublisher {
    fn enqueue(&self, event: OutboundEvent) -> Result<(), PublishError> {
        match self.events.lock() {
            Ok(mut guard) => {
                guard.push(event);
                Ok(())
            }
            Err(_) => Err(PublishError::Closed),
        }
    }

    fn flush(&self) {}

    fn close(&self) {}
}

/// A publisher that drops every event, counting them. Used when no broker
/// is configured.
#[derive(Debug, Default)]
pub struct NullPublisher {
    dropped: AtomicU64,
}

impl NullPublisher {
    /// Create a new null publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventPublisher for NullPublisher {
    fn enqueue(&self, _event: OutboundEvent) -> Result<(), PublishError> {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) {}

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(topic: Topic, key: &str) -> OutboundEvent {
        OutboundEvent {
            topic,
            key: key.into(),
            payload: bytes::Bytes::from_static(b"{}"),
        }
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::Matches.as_str(), "matches");
        assert_eq!(Topic::Orders.as_str(), "orders");
    }

    #[test]
    fn test_buffer_publisher_retains_events() {
        let publisher = BufferPublisher::new();
        assert!(publisher.is_empty());
        assert!(publisher.enqueue(event(Topic::Matches, "A")).is_ok());
        assert!(publisher.enqueue(event(Topic::Orders, "A")).is_ok());

        let events = publisher.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].topic, Topic::Matches);
        assert_eq!(events[1].topic, Topic::Orders);
    }

    #[test]
    fn test_null_publisher_counts_drops() {
        let publisher = NullPublisher::new();
        assert!(publisher.enqueue(event(Topic::Matches, "A")).is_ok());
        assert!(publisher.enqueue(event(Topic::Matches, "A")).is_ok());
        assert_eq!(publisher.dropped(), 2);
    }
}
