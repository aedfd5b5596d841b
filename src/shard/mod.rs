//! Shard assembly: wires the ring, the consumer thread, the WAL, the
//! publisher, and the HTTP surfaces together.

mod config;
mod http;

pub use config::{ConfigError, DEFAULT_RING_BUFFER_SIZE, DEFAULT_WAL_SIZE_BYTES, ShardConfig};
pub use http::{OrderRequest, SeedRequest, ShardHttpState, shard_router};

use crate::ingress::{OrderIngress, RingBuffer};
use crate::metrics::ShardMetrics;
use crate::processor::{EventProcessor, SeedOrder};
use crate::publish::EventPublisher;
use crate::wal::{WalError, WriteAheadLog};
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use crossbeam::channel::{Sender, unbounded};
use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{error, info};

/// Errors raised while starting a shard.
#[derive(Debug)]
#[non_exhaustive]
pub enum ShardError {
    /// The WAL could not be created or opened.
    Wal(WalError),

    /// The consumer thread could not be spawned.
    Spawn(std::io::Error),
}

impl fmt::Display for ShardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardError::Wal(e) => write!(f, "wal setup failed: {e}"),
            ShardError::Spawn(e) => write!(f, "consumer thread spawn failed: {e}"),
        }
    }
}

impl std::error::Error for ShardError {}

impl From<WalError> for ShardError {
    fn from(err: WalError) -> Self {
        ShardError::Wal(err)
    }
}

/// A running shard: the consumer thread plus the handles its HTTP surface
/// needs.
pub struct ShardHandle {
    /// Producer handle into the ring.
    pub ingress: OrderIngress,
    /// Side channel for seed orders.
    pub seed_tx: Sender<SeedOrder>,
    /// The shard's metrics registry.
    pub metrics: Arc<ShardMetrics>,
    shard_id: String,
    symbols: Arc<HashSet<String>>,
    shutdown: Arc<AtomicBool>,
    consumer: Option<JoinHandle<EventProcessor>>,
}

impl ShardHandle {
    /// The shard identifier.
    #[must_use]
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// State for [`shard_router`].
    #[must_use]
    pub fn http_state(&self) -> ShardHttpState {
        ShardHttpState {
            ingress: self.ingress.clone(),
            seed_tx: self.seed_tx.clone(),
            shard_id: Arc::from(self.shard_id.as_str()),
            symbols: Arc::clone(&self.symbols),
        }
    }

    /// Signal shutdown and join the consumer.
    ///
    /// The consumer drains the ring to the current cursor, forces the WAL,
    /// and closes the publisher before exiting. Returns the processor so
    /// callers can inspect final book state.
    pub fn shutdown(mut self) -> Option<EventProcessor> {
        self.shutdown.store(true, Ordering::Release);
        let handle = self.consumer.take()?;
        match handle.join() {
            Ok(processor) => Some(processor),
            Err(_) => {
                error!(shard = %self.shard_id, "consumer thread lost on shutdown");
                None
            }
        }
    }
}

impl fmt::Debug for ShardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardHandle")
            .field("shard_id", &self.shard_id)
            .field("symbols", &self.symbols)
            .finish()
    }
}

/// Start a shard: allocate the ring and the WAL, then spawn the dedicated
/// consumer thread.
///
/// An invariant violation inside the pipeline panics the consumer; the
/// thread wrapper escalates that to a process abort, because the shard must
/// not keep serving from a corrupted book.
///
/// # Errors
///
/// Returns [`ShardError`] when the WAL cannot be set up or the thread cannot
/// be spawned.
pub fn start_shard(
    config: &ShardConfig,
    publisher: Arc<dyn EventPublisher>,
) -> Result<ShardHandle, ShardError> {
    let ring = Arc::new(RingBuffer::with_capacity(config.ring_buffer_size));
    let wal = WriteAheadLog::open_or_create(&config.wal_path, config.wal_size_bytes)?;
    let metrics = Arc::new(ShardMetrics::new(config.shard_id.clone()));
    let symbols: Arc<HashSet<String>> =
        Arc::new(config.shard_symbols.iter().cloned().collect());
    let (seed_tx, seed_rx) = unbounded();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut processor = EventProcessor::new(
        config.shard_id.clone(),
        config.shard_symbols.iter().cloned(),
        Arc::clone(&ring),
        wal,
        publisher,
        Arc::clone(&metrics),
        seed_rx,
        Arc::clone(&shutdown),
    );

    let consumer = std::thread::Builder::new()
        .name(format!("{}-matcher", config.shard_id))
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| processor.run()));
            if outcome.is_err() {
                error!("invariant violation in event processor; aborting shard");
                std::process::abort();
            }
            processor
        })
        .map_err(ShardError::Spawn)?;

    info!(
        shard = %config.shard_id,
        symbols = config.shard_symbols.len(),
        ring = config.ring_buffer_size,
        wal = %config.wal_path.display(),
        "shard started"
    );

    Ok(ShardHandle {
        ingress: OrderIngress::new(ring),
        seed_tx,
        metrics,
        shard_id: config.shard_id.clone(),
        symbols,
        shutdown,
        consumer: Some(consumer),
    })
}

/// Router for the metrics listener: `GET /metrics` in Prometheus text
/// exposition format.
pub fn metrics_router(metrics: Arc<ShardMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<ShardMetrics>>) -> String {
    metrics.render()
}
