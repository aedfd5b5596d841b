//! NATS outbound event publisher.
//!
//! [`NatsEventPublisher`] bridges the synchronous consumer thread and an
//! asynchronous NATS connection. The hot side is a bounded lock-free queue:
//! `enqueue` is a single push and returns immediately, full or not. A
//! dedicated background thread drains the queue and publishes each event to
//! the `{topic}.{key}` subject (e.g. `matches.AAPL`) as a fire-and-forget
//! core-NATS message — no acknowledgement is awaited; the WAL carries the
//! durable record.

use super::{EventPublisher, OutboundEvent, PublishError};
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Default capacity of the outbound buffer.
const DEFAULT_QUEUE_CAPACITY: usize = 65_536;

/// Idle tick of the worker loop; the batch-boundary flush notification wakes
/// it sooner.
const WORKER_TICK: Duration = Duration::from_millis(1);

struct Shared {
    queue: ArrayQueue<OutboundEvent>,
    notify: Notify,
    shutdown: AtomicBool,
    published: AtomicU64,
    errors: AtomicU64,
}

/// An [`EventPublisher`] backed by a NATS connection.
///
/// The network transmission runs on a worker thread owned by the publisher;
/// that worker may block on I/O without affecting matching.
pub struct NatsEventPublisher {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NatsEventPublisher {
    /// Create a publisher over an established NATS client with the default
    /// outbound buffer capacity.
    #[must_use]
    pub fn new(client: async_nats::Client) -> Self {
        Self::with_capacity(client, DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a publisher with an explicit outbound buffer capacity.
    ///
    /// Spawns the background worker thread immediately.
    #[must_use]
    pub fn with_capacity(client: async_nats::Client, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
            published: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("nats-publisher".to_string())
            .spawn(move || worker_main(client, worker_shared))
            .ok();
        if worker.is_none() {
            error!("failed to spawn nats publisher worker thread");
        }

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Number of successfully published messages.
    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Number of failed publish attempts.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.shared.errors.load(Ordering::Relaxed)
    }
}

impl EventPublisher for NatsEventPublisher {
    fn enqueue(&self, event: OutboundEvent) -> Result<(), PublishError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        self.shared
            .queue
            .push(event)
            .map_err(|_| PublishError::QueueFull)
    }

    fn flush(&self) {
        self.shared.notify.notify_one();
    }

    fn close(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.notify.notify_one();
        let handle = self.worker.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("nats publisher worker panicked");
            }
        }
        info!(
            published = self.publish_count(),
            errors = self.error_count(),
            "nats publisher closed"
        );
    }
}

impl std::fmt::Debug for NatsEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsEventPublisher")
            .field("queued", &self.shared.queue.len())
            .field("published", &self.publish_count())
            .field("errors", &self.error_count())
            .finish()
    }
}

/// Worker thread entry: a single-threaded runtime running the drain loop.
fn worker_main(client: async_nats::Client, shared: Arc<Shared>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build nats publisher runtime");
            return;
        }
    };
    runtime.block_on(drain_loop(client, shared));
}

async fn drain_loop(client: async_nats::Client, shared: Arc<Shared>) {
    loop {
        let mut drained = false;
        while let Some(event) = shared.queue.pop() {
            drained = true;
            let subject = format!("{}.{}", event.topic.as_str(), event.key);
            match client.publish(subject, event.payload).await {
                Ok(()) => {
                    shared.published.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    shared.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, topic = event.topic.as_str(), "nats publish failed");
                }
            }
        }

        if drained {
            if let Err(e) = client.flush().await {
                warn!(error = %e, "nats flush failed");
            }
        }

        if shared.shutdown.load(Ordering::Acquire) && shared.queue.is_empty() {
            if let Err(e) = client.flush().await {
                warn!(error = %e, "final nats flush failed");
            }
            break;
        }

        tokio::select! {
            _ = shared.notify.notified() => {}
            _ = tokio::time::sleep(WORKER_TICK) => {}
        }
    }
}
