//! Lock-free multi-producer ingress: the slot ring and the producer handle.

mod event;
mod ring;
mod wait;

pub use event::OrderEvent;
pub use ring::{RingBuffer, RingFull};
pub use wait::YieldingWait;

use crate::engine::{OrderKind, Side};
use std::sync::Arc;

/// The producer-side handle network handlers use to push orders into a
/// shard's ring. Cheap to clone; every clone targets the same ring.
#[derive(Debug, Clone)]
pub struct OrderIngress {
    ring: Arc<RingBuffer>,
}

impl OrderIngress {
    /// Wrap a shared ring.
    #[must_use]
    pub fn new(ring: Arc<RingBuffer>) -> Self {
        Self { ring }
    }

    /// Claim a slot, overwrite it from the submission, and publish it.
    ///
    /// Stamps the slot with a monotonic receive time just before publish.
    ///
    /// # Errors
    ///
    /// Returns [`RingFull`] when the ring is saturated; the submission is
    /// dropped and the caller should surface a busy response.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        order_id: &str,
        symbol: &str,
        side: Side,
        kind: OrderKind,
        price: i64,
        quantity: u64,
        timestamp_ms: u64,
    ) -> Result<u64, RingFull> {
        self.ring.try_publish(|slot| {
            slot.overwrite(order_id, symbol, side, kind, price, quantity, timestamp_ms);
        })
    }

    /// The underlying ring, for telemetry.
    #[must_use]
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }
}
