//! Latch-free shard metrics.
//!
//! One fixed-shape registry per shard: atomic counters, last-write-wins
//! gauges, and atomic-bucket latency histograms. The consumer thread is the
//! only writer; the metrics HTTP listener reads concurrently. No atomicity
//! across metrics is needed or provided.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Bucket boundaries in microseconds: 1µs .. 1s.
const LATENCY_BUCKETS_US: [u64; 16] = [
    1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 100_000, 500_000, 1_000_000,
];

/// A fixed-bucket latency histogram safe for single-writer updates with
/// concurrent readers.
#[derive(Debug)]
pub struct LatencyHistogram {
    counts: [AtomicU64; LATENCY_BUCKETS_US.len()],
    /// Sum of all observations, microseconds.
    sum: AtomicU64,
    count: AtomicU64,
}

impl LatencyHistogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record an observation in microseconds.
    pub fn record(&self, value_us: u64) {
        for (i, &boundary) in LATENCY_BUCKETS_US.iter().enumerate() {
            if value_us <= boundary {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an observation from a duration.
    pub fn record_duration(&self, duration: Duration) {
        self.record(duration.as_micros() as u64);
    }

    /// Total number of observations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Mean observation in microseconds, zero when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Render as a Prometheus histogram with `le` boundaries in seconds.
    fn render(&self, out: &mut String, name: &str, labels: &str) {
        use std::fmt::Write;
        let mut cumulative = 0u64;
        for (i, &boundary) in LATENCY_BUCKETS_US.iter().enumerate() {
            cumulative += self.counts[i].load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "{name}_bucket{{{labels},le=\"{}\"}} {cumulative}",
                boundary as f64 / 1_000_000.0
            );
        }
        let total = self.count();
        let _ = writeln!(out, "{name}_bucket{{{labels},le=\"+Inf\"}} {total}");
        let _ = writeln!(
            out,
            "{name}_sum{{{labels}}} {}",
            self.sum.load(Ordering::Relaxed) as f64 / 1_000_000.0
        );
        let _ = writeln!(out, "{name}_count{{{labels}}} {total}");
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-shard metrics registry.
#[derive(Debug)]
pub struct ShardMetrics {
    shard_id: String,

    /// End-to-end latency from producer handoff to pipeline completion.
    pub end_to_end: LatencyHistogram,
    /// Per-phase sub-timings of the event pipeline.
    pub phase_validation: LatencyHistogram,
    /// Matching walk duration (includes book lookup and order construction).
    pub phase_matching: LatencyHistogram,
    /// Resting-insertion duration.
    pub phase_insertion: LatencyHistogram,
    /// WAL append duration.
    pub phase_wal: LatencyHistogram,
    /// Publisher enqueue duration.
    pub phase_publish: LatencyHistogram,

    /// Orders received, by side.
    pub orders_received_buy: AtomicU64,
    /// Orders received, by side.
    pub orders_received_sell: AtomicU64,
    /// Match results emitted.
    pub matches_emitted: AtomicU64,
    /// Orders rejected by consumer-side validation.
    pub orders_rejected: AtomicU64,
    /// Failed publisher enqueues.
    pub publish_errors: AtomicU64,
    /// Failed WAL appends or flushes.
    pub wal_errors: AtomicU64,

    /// Total resting bid quantity across the shard's books.
    pub bid_depth: AtomicU64,
    /// Total resting ask quantity across the shard's books.
    pub ask_depth: AtomicU64,
    /// Total bid price levels across the shard's books.
    pub bid_levels: AtomicU64,
    /// Total ask price levels across the shard's books.
    pub ask_levels: AtomicU64,
    /// Ring occupancy ratio in `[0, 1]`, stored as `f64` bits.
    ring_utilization: AtomicU64,
}

impl ShardMetrics {
    /// Create a zeroed registry labeled with `shard_id`.
    #[must_use]
    pub fn new(shard_id: impl Into<String>) -> Self {
        Self {
            shard_id: shard_id.into(),
            end_to_end: LatencyHistogram::new(),
            phase_validation: LatencyHistogram::new(),
            phase_matching: LatencyHistogram::new(),
            phase_insertion: LatencyHistogram::new(),
            phase_wal: LatencyHistogram::new(),
            phase_publish: LatencyHistogram::new(),
            orders_received_buy: AtomicU64::new(0),
            orders_received_sell: AtomicU64::new(0),
            matches_emitted: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            publish_errors: AtomicU64::new(0),
            wal_errors: AtomicU64::new(0),
            bid_depth: AtomicU64::new(0),
            ask_depth: AtomicU64::new(0),
            bid_levels: AtomicU64::new(0),
            ask_levels: AtomicU64::new(0),
            ring_utilization: AtomicU64::new(0),
        }
    }

    /// The shard this registry labels.
    #[must_use]
    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// Store the ring occupancy ratio.
    pub fn set_ring_utilization(&self, ratio: f64) {
        self.ring_utilization
            .store(ratio.to_bits(), Ordering::Relaxed);
    }

    /// The last stored ring occupancy ratio.
    #[must_use]
    pub fn ring_utilization(&self) -> f64 {
        f64::from_bits(self.ring_utilization.load(Ordering::Relaxed))
    }

    /// Write the book gauges through in one call.
    pub fn set_book_gauges(
        &self,
        bid_depth: u64,
        ask_depth: u64,
        bid_levels: u64,
        ask_levels: u64,
    ) {
        self.bid_depth.store(bid_depth, Ordering::Relaxed);
        self.ask_depth.store(ask_depth, Ordering::Relaxed);
        self.bid_levels.store(bid_levels, Ordering::Relaxed);
        self.ask_levels.store(ask_levels, Ordering::Relaxed);
    }

    /// Render the full registry in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(8 * 1024);
        let shard = format!("shard_id=\"{}\"", self.shard_id);

        out.push_str("# HELP matchcore_match_duration_seconds End-to-end match pipeline latency\n");
        out.push_str("# TYPE matchcore_match_duration_seconds histogram\n");
        self.end_to_end
            .render(&mut out, "matchcore_match_duration_seconds", &shard);

        out.push_str("\n# HELP matchcore_phase_duration_seconds Pipeline phase latency\n");
        out.push_str("# TYPE matchcore_phase_duration_seconds histogram\n");
        for (phase, hist) in [
            ("validation", &self.phase_validation),
            ("matching", &self.phase_matching),
            ("insertion", &self.phase_insertion),
            ("wal", &self.phase_wal),
            ("publish", &self.phase_publish),
        ] {
            let labels = format!("{shard},phase=\"{phase}\"");
            hist.render(&mut out, "matchcore_phase_duration_seconds", &labels);
        }

        out.push_str("\n# HELP matchcore_orders_received_total Orders received, by side\n");
        out.push_str("# TYPE matchcore_orders_received_total counter\n");
        let _ = writeln!(
            out,
            "matchcore_orders_received_total{{{shard},side=\"BUY\"}} {}",
            self.orders_received_buy.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "matchcore_orders_received_total{{{shard},side=\"SELL\"}} {}",
            self.orders_received_sell.load(Ordering::Relaxed)
        );

        for (name, help, value) in [
            (
                "matchcore_matches_emitted_total",
                "Match results emitted",
                &self.matches_emitted,
            ),
            (
                "matchcore_orders_rejected_total",
                "Orders rejected by validation",
                &self.orders_rejected,
            ),
            (
                "matchcore_publish_errors_total",
                "Failed outbound publish enqueues",
                &self.publish_errors,
            ),
            (
                "matchcore_wal_errors_total",
                "Failed WAL appends or flushes",
                &self.wal_errors,
            ),
        ] {
            let _ = writeln!(out, "\n# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name}{{{shard}}} {}", value.load(Ordering::Relaxed));
        }

        out.push_str("\n# HELP matchcore_book_depth Resting quantity, by side\n");
        out.push_str("# TYPE matchcore_book_depth gauge\n");
        let _ = writeln!(
            out,
            "matchcore_book_depth{{{shard},side=\"bid\"}} {}",
            self.bid_depth.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "matchcore_book_depth{{{shard},side=\"ask\"}} {}",
            self.ask_depth.load(Ordering::Relaxed)
        );

        out.push_str("\n# HELP matchcore_book_levels Price level count, by side\n");
        out.push_str("# TYPE matchcore_book_levels gauge\n");
        let _ = writeln!(
            out,
            "matchcore_book_levels{{{shard},side=\"bid\"}} {}",
            self.bid_levels.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "matchcore_book_levels{{{shard},side=\"ask\"}} {}",
            self.ask_levels.load(Ordering::Relaxed)
        );

        out.push_str("\n# HELP matchcore_ring_buffer_utilization Ring occupancy ratio\n");
        out.push_str("# TYPE matchcore_ring_buffer_utilization gauge\n");
        let _ = writeln!(
            out,
            "matchcore_ring_buffer_utilization{{{shard}}} {}",
            self.ring_utilization()
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_record_and_mean() {
        let hist = LatencyHistogram::new();
        hist.record(10);
        hist.record(20);
        hist.record(30);
        assert_eq!(hist.count(), 3);
        assert!((hist.mean() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_histogram_buckets_are_cumulative_in_render() {
        let hist = LatencyHistogram::new();
        hist.record(1);
        hist.record(3);
        hist.record(2_000_000); // beyond the last boundary: only +Inf

        let mut out = String::new();
        hist.render(&mut out, "test_metric", "shard_id=\"s\"");
        assert!(out.contains("test_metric_bucket{shard_id=\"s\",le=\"0.000001\"} 1"));
        assert!(out.contains("test_metric_bucket{shard_id=\"s\",le=\"+Inf\"} 3"));
        assert!(out.contains("test_metric_count{shard_id=\"s\"} 3"));
    }

    #[test]
    fn test_ring_utilization_roundtrip() {
        let metrics = ShardMetrics::new("s1");
        metrics.set_ring_utilization(0.25);
        assert!((metrics.ring_utilization() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_render_contains_all_families() {
        let metrics = ShardMetrics::new("s1");
        metrics.orders_received_buy.fetch_add(2, Ordering::Relaxed);
        metrics.matches_emitted.fetch_add(1, Ordering::Relaxed);
        metrics.set_book_gauges(100, 200, 3, 4);

        let text = metrics.render();
        assert!(text.contains("matchcore_match_duration_seconds_count{shard_id=\"s1\"}"));
        assert!(text.contains("phase=\"wal\""));
        assert!(text.contains("matchcore_orders_received_total{shard_id=\"s1\",side=\"BUY\"} 2"));
        assert!(text.contains("matchcore_matches_emitted_total{shard_id=\"s1\"} 1"));
        assert!(text.contains("matchcore_book_depth{shard_id=\"s1\",side=\"ask\"} 200"));
        assert!(text.contains("matchcore_ring_buffer_utilization{shard_id=\"s1\"} 0"));
    }
}
