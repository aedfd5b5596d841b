//! The lock-free multi-producer, single-consumer slot ring.
//!
//! A fixed power-of-two array of pre-allocated [`OrderEvent`] slots. Producers
//! reserve a sequence with a gated compare-and-swap on the shared cursor,
//! overwrite their slot in place, and publish it by storing the sequence into
//! the slot's availability cell with release ordering. The single consumer
//! scans availability with acquire ordering, drains every contiguous slot in
//! one batch, and then frees the range by advancing its own sequence.
//!
//! A full ring fails the claim immediately — producers never wait, and a
//! failed claim leaves the cursor untouched.

use super::event::OrderEvent;
use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel for "no sequence published at this index yet".
const UNPUBLISHED: u64 = u64::MAX;

/// The overflow condition returned to producers when the ring is full.
///
/// Surfaced to submitters as a busy (503) response; the caller is expected
/// to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingFull;

impl fmt::Display for RingFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ring buffer full")
    }
}

impl std::error::Error for RingFull {}

/// A fixed-size multi-producer/single-consumer ring of [`OrderEvent`] slots.
pub struct RingBuffer {
    slots: Box<[UnsafeCell<OrderEvent>]>,
    /// Per-slot publication cell holding the sequence last published at that
    /// index, or [`UNPUBLISHED`].
    available: Box<[AtomicU64]>,
    /// Next sequence to be claimed by a producer.
    cursor: CachePadded<AtomicU64>,
    /// Next sequence to be consumed. Written only by the consumer.
    next_consume: CachePadded<AtomicU64>,
    mask: u64,
}

// SAFETY: slot access is coordinated by the claim/publish/consume protocol.
// A producer has exclusive access to a slot between a successful claim and
// the release-store into `available`; the consumer only reads a slot after
// an acquire-load observes that store, and frees it only after the read.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring with `size` pre-allocated slots.
    ///
    /// # Panics
    ///
    /// Panics unless `size` is a non-zero power of two; position arithmetic
    /// relies on masking.
    #[must_use]
    pub fn with_capacity(size: usize) -> Self {
        assert!(
            size > 0 && size.is_power_of_two(),
            "ring size must be a power of two, got {size}"
        );
        let slots: Box<[UnsafeCell<OrderEvent>]> = (0..size)
            .map(|_| UnsafeCell::new(OrderEvent::default()))
            .collect();
        let available: Box<[AtomicU64]> =
            (0..size).map(|_| AtomicU64::new(UNPUBLISHED)).collect();
        Self {
            slots,
            available,
            cursor: CachePadded::new(AtomicU64::new(0)),
            next_consume: CachePadded::new(AtomicU64::new(0)),
            mask: size as u64 - 1,
        }
    }

    /// Number of slots.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Sequences claimed but not yet freed by the consumer.
    #[must_use]
    pub fn pending(&self) -> u64 {
        let claimed = self.cursor.load(Ordering::Acquire);
        let consumed = self.next_consume.load(Ordering::Acquire);
        claimed.saturating_sub(consumed)
    }

    /// Occupancy ratio in `[0, 1]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        (self.pending() as f64 / self.capacity() as f64).min(1.0)
    }

    /// Whether every claimed sequence has been consumed.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }

    /// Claim the next sequence, or fail immediately when the ring is full.
    ///
    /// The gate is checked before the compare-and-swap, so a full ring never
    /// moves the cursor.
    fn try_claim(&self) -> Result<u64, RingFull> {
        let size = self.capacity() as u64;
        loop {
            let seq = self.cursor.load(Ordering::Acquire);
            let consumed = self.next_consume.load(Ordering::Acquire);
            if seq.wrapping_sub(consumed) >= size {
                return Err(RingFull);
            }
            if self
                .cursor
                .compare_exchange_weak(seq, seq + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(seq);
            }
        }
    }

    /// Claim a slot, overwrite it via `fill`, and publish it to the consumer.
    ///
    /// Returns the claimed sequence. The release-store of the sequence into
    /// the availability cell orders every field write in `fill` before the
    /// consumer's acquire-load, so the consumer always observes a fully
    /// populated slot.
    ///
    /// # Errors
    ///
    /// Returns [`RingFull`] without side effects when no slot is free.
    pub fn try_publish<F>(&self, fill: F) -> Result<u64, RingFull>
    where
        F: FnOnce(&mut OrderEvent),
    {
        let seq = self.try_claim()?;
        let idx = (seq & self.mask) as usize;
        // SAFETY: the successful claim grants this producer exclusive access
        // to the slot at `idx` until the availability store below.
        let slot = unsafe { &mut *self.slots[idx].get() };
        fill(slot);
        self.available[idx].store(seq, Ordering::Release);
        Ok(seq)
    }

    #[inline]
    fn is_published(&self, seq: u64) -> bool {
        let idx = (seq & self.mask) as usize;
        self.available[idx].load(Ordering::Acquire) == seq
    }

    /// Drain every contiguously published slot, up to `max_batch`, invoking
    /// `handle(slot, sequence, end_of_batch)` for each in sequence order.
    ///
    /// The last event of the batch is flagged `end_of_batch = true` so
    /// downstream stages can amortize I/O. Returns the number of events
    /// consumed; zero means nothing was available. Must only be called from
    /// the single consumer thread.
    pub fn try_consume_batch<F>(&self, max_batch: usize, mut handle: F) -> usize
    where
        F: FnMut(&OrderEvent, u64, bool),
    {
        let next = self.next_consume.load(Ordering::Relaxed);
        let mut hi = next;
        while hi - next < max_batch as u64 && self.is_published(hi) {
            hi += 1;
        }
        if hi == next {
            return 0;
        }

        for seq in next..hi {
            let idx = (seq & self.mask) as usize;
            // SAFETY: `is_published` observed the producer's release-store
            // for this sequence, and the slot cannot be reclaimed until the
            // consumer sequence advances past it below.
            let slot = unsafe { &*self.slots[idx].get() };
            handle(slot, seq, seq + 1 == hi);
        }

        // Frees the consumed range for producers.
        self.next_consume.store(hi, Ordering::Release);
        (hi - next) as usize
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .field("next_consume", &self.next_consume.load(Ordering::Relaxed))
            .finish()
    }
}
