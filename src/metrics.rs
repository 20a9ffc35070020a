//! Decomposed operation timing and the thread-safe metrics accumulator.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::time::{Clock, SystemClock, TimingContext};

/// Histogram ceiling: one hour in nanoseconds. Values above it saturate.
pub const MAX_RECORDABLE_NANOS: u64 = 3_600_000_000_000;

const SIGNIFICANT_DIGITS: u8 = 3;

// ────────────────────────────────────────────────────────────────────────────
// OverheadBreakdown
// ────────────────────────────────────────────────────────────────────────────

/// Immutable decomposition of one operation's latency.
///
/// A zero component means "not measured by this adapter for this
/// operation", not "took zero time". `total_latency` bounds
/// `server_execution_time` under faithful adapters, but that is a quality
/// check for tests, not a construction precondition: adapters may report
/// partial data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverheadBreakdown {
    total_latency: Duration,
    connection_acquisition: Duration,
    connection_release: Duration,
    serialization_time: Duration,
    wire_transmit_time: Duration,
    server_execution_time: Duration,
    server_parse_time: Duration,
    server_traversal_time: Duration,
    server_index_time: Duration,
    server_fetch_time: Duration,
    wire_receive_time: Duration,
    deserialization_time: Duration,
    client_traversal_time: Duration,
    platform_specific: BTreeMap<String, Duration>,
}

impl OverheadBreakdown {
    pub fn builder() -> OverheadBreakdownBuilder {
        OverheadBreakdownBuilder::default()
    }

    pub fn total_latency(&self) -> Duration {
        self.total_latency
    }

    pub fn connection_acquisition(&self) -> Duration {
        self.connection_acquisition
    }

    pub fn connection_release(&self) -> Duration {
        self.connection_release
    }

    pub fn serialization_time(&self) -> Duration {
        self.serialization_time
    }

    pub fn wire_transmit_time(&self) -> Duration {
        self.wire_transmit_time
    }

    pub fn server_execution_time(&self) -> Duration {
        self.server_execution_time
    }

    pub fn server_parse_time(&self) -> Duration {
        self.server_parse_time
    }

    pub fn server_traversal_time(&self) -> Duration {
        self.server_traversal_time
    }

    pub fn server_index_time(&self) -> Duration {
        self.server_index_time
    }

    pub fn server_fetch_time(&self) -> Duration {
        self.server_fetch_time
    }

    pub fn wire_receive_time(&self) -> Duration {
        self.wire_receive_time
    }

    pub fn deserialization_time(&self) -> Duration {
        self.deserialization_time
    }

    pub fn client_traversal_time(&self) -> Duration {
        self.client_traversal_time
    }

    pub fn platform_specific(&self) -> &BTreeMap<String, Duration> {
        &self.platform_specific
    }

    /// Everything except the actual data fetch.
    pub fn total_overhead(&self) -> Duration {
        self.total_latency.saturating_sub(self.server_fetch_time)
    }

    /// Server plus client navigation time. The primary comparison metric
    /// for sequential-scan vs hash-indexed formats.
    pub fn traversal_overhead(&self) -> Duration {
        self.server_traversal_time + self.client_traversal_time
    }

    pub fn network_overhead(&self) -> Duration {
        self.wire_transmit_time + self.wire_receive_time
    }

    pub fn serialization_overhead(&self) -> Duration {
        self.serialization_time + self.deserialization_time
    }

    pub fn connection_overhead(&self) -> Duration {
        self.connection_acquisition + self.connection_release
    }

    pub fn traversal_percentage(&self) -> f64 {
        self.percentage_of_total(self.traversal_overhead())
    }

    pub fn overhead_percentage(&self) -> f64 {
        self.percentage_of_total(self.total_overhead())
    }

    pub fn network_percentage(&self) -> f64 {
        self.percentage_of_total(self.network_overhead())
    }

    pub fn serialization_percentage(&self) -> f64 {
        self.percentage_of_total(self.serialization_overhead())
    }

    fn percentage_of_total(&self, part: Duration) -> f64 {
        if self.total_latency.is_zero() {
            return 0.0;
        }
        part.as_nanos() as f64 / self.total_latency.as_nanos() as f64 * 100.0
    }
}

/// Builder with zero defaults for unmeasured components.
#[derive(Debug, Default)]
pub struct OverheadBreakdownBuilder {
    inner: OverheadBreakdown,
}

impl OverheadBreakdownBuilder {
    pub fn total_latency(mut self, d: Duration) -> Self {
        self.inner.total_latency = d;
        self
    }

    pub fn connection_acquisition(mut self, d: Duration) -> Self {
        self.inner.connection_acquisition = d;
        self
    }

    pub fn connection_release(mut self, d: Duration) -> Self {
        self.inner.connection_release = d;
        self
    }

    pub fn serialization_time(mut self, d: Duration) -> Self {
        self.inner.serialization_time = d;
        self
    }

    pub fn wire_transmit_time(mut self, d: Duration) -> Self {
        self.inner.wire_transmit_time = d;
        self
    }

    pub fn server_execution_time(mut self, d: Duration) -> Self {
        self.inner.server_execution_time = d;
        self
    }

    pub fn server_parse_time(mut self, d: Duration) -> Self {
        self.inner.server_parse_time = d;
        self
    }

    pub fn server_traversal_time(mut self, d: Duration) -> Self {
        self.inner.server_traversal_time = d;
        self
    }

    pub fn server_index_time(mut self, d: Duration) -> Self {
        self.inner.server_index_time = d;
        self
    }

    pub fn server_fetch_time(mut self, d: Duration) -> Self {
        self.inner.server_fetch_time = d;
        self
    }

    pub fn wire_receive_time(mut self, d: Duration) -> Self {
        self.inner.wire_receive_time = d;
        self
    }

    pub fn deserialization_time(mut self, d: Duration) -> Self {
        self.inner.deserialization_time = d;
        self
    }

    pub fn client_traversal_time(mut self, d: Duration) -> Self {
        self.inner.client_traversal_time = d;
        self
    }

    /// Replaces the platform-specific map. The breakdown owns its copy;
    /// later changes to the caller's map are not observed.
    pub fn platform_specific(mut self, map: BTreeMap<String, Duration>) -> Self {
        self.inner.platform_specific = map;
        self
    }

    pub fn add_platform_specific(mut self, key: impl Into<String>, d: Duration) -> Self {
        self.inner.platform_specific.insert(key.into(), d);
        self
    }

    pub fn build(self) -> OverheadBreakdown {
        self.inner
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Summaries
// ────────────────────────────────────────────────────────────────────────────

/// Point-in-time statistics for one metric's histogram. All values are
/// nanoseconds except `count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
    pub std_dev: f64,
    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
}

/// Snapshot of every histogram and counter in a collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub histograms: BTreeMap<String, HistogramSummary>,
    pub counters: BTreeMap<String, u64>,
}

impl MetricsSummary {
    pub fn histogram(&self, metric: &str) -> Option<&HistogramSummary> {
        self.histograms.get(metric)
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty() && self.counters.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MetricsCollector
// ────────────────────────────────────────────────────────────────────────────

/// Thread-safe accumulator of named latency histograms and counters.
///
/// Many threads may record concurrently; each histogram takes its own lock
/// so the hot path contends only on same-metric writes. `summarize` is a
/// weak snapshot: consistent with some serialization of the recordings,
/// but records racing with it may or may not be visible.
pub struct MetricsCollector {
    histograms: RwLock<HashMap<String, Mutex<Histogram<u64>>>>,
    counters: RwLock<HashMap<String, AtomicU64>>,
    clock: Arc<dyn Clock>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            histograms: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Records one sample. Values above one hour saturate to the cap.
    pub fn record(&self, metric: &str, duration: Duration) {
        let nanos = (duration.as_nanos().min(MAX_RECORDABLE_NANOS as u128)) as u64;
        self.record_clamped(metric, nanos);
    }

    /// Records a signed nanosecond sample; negatives coerce to zero.
    pub fn record_nanos(&self, metric: &str, nanos: i64) {
        let clamped = nanos.max(0) as u64;
        self.record_clamped(metric, clamped.min(MAX_RECORDABLE_NANOS));
    }

    fn record_clamped(&self, metric: &str, nanos: u64) {
        {
            let map = self.histograms.read();
            if let Some(hist) = map.get(metric) {
                let _ = hist.lock().record(nanos);
                return;
            }
        }
        let mut map = self.histograms.write();
        let hist = map
            .entry(metric.to_string())
            .or_insert_with(|| Mutex::new(new_histogram()));
        let _ = hist.lock().record(nanos);
    }

    /// Dispatches every component of a breakdown into its conventional
    /// bucket, then the derived metrics, then the platform map verbatim.
    pub fn record_breakdown(&self, breakdown: &OverheadBreakdown) {
        self.record("total_latency", breakdown.total_latency());
        self.record("connection_acquisition", breakdown.connection_acquisition());
        self.record("connection_release", breakdown.connection_release());
        self.record("serialization", breakdown.serialization_time());
        self.record("wire_transmit", breakdown.wire_transmit_time());
        self.record("server_execution", breakdown.server_execution_time());
        self.record("server_parse", breakdown.server_parse_time());
        self.record("server_traversal", breakdown.server_traversal_time());
        self.record("server_index", breakdown.server_index_time());
        self.record("server_fetch", breakdown.server_fetch_time());
        self.record("wire_receive", breakdown.wire_receive_time());
        self.record("deserialization", breakdown.deserialization_time());
        self.record("client_traversal", breakdown.client_traversal_time());

        self.record("total_traversal", breakdown.traversal_overhead());
        self.record("total_overhead", breakdown.total_overhead());
        self.record("network_overhead", breakdown.network_overhead());
        self.record("serialization_overhead", breakdown.serialization_overhead());
        self.record("connection_overhead", breakdown.connection_overhead());

        for (name, duration) in breakdown.platform_specific() {
            self.record(name, *duration);
        }
    }

    /// Times a closure, records the elapsed duration, and passes the
    /// closure's return value through.
    pub fn time_operation<T>(&self, metric: &str, operation: impl FnOnce() -> T) -> T {
        let ctx = TimingContext::start(self.clock.as_ref());
        let out = operation();
        self.record(metric, ctx.stop());
        out
    }

    pub fn increment_counter(&self, name: &str) {
        self.add_counter(name, 1);
    }

    pub fn add_counter(&self, name: &str, value: u64) {
        {
            let map = self.counters.read();
            if let Some(counter) = map.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }
        let mut map = self.counters.write();
        map.entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Drops all recorded state. Summaries produced strictly afterwards
    /// observe no pre-reset samples.
    pub fn reset(&self) {
        self.histograms.write().clear();
        self.counters.write().clear();
    }

    pub fn summarize(&self) -> MetricsSummary {
        let histograms = self
            .histograms
            .read()
            .iter()
            .map(|(name, hist)| (name.clone(), summarize_histogram(&hist.lock())))
            .collect();
        let counters = self
            .counters
            .read()
            .iter()
            .map(|(name, counter)| (name.clone(), counter.load(Ordering::Relaxed)))
            .collect();
        MetricsSummary {
            histograms,
            counters,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, MAX_RECORDABLE_NANOS, SIGNIFICANT_DIGITS)
        .expect("failed to create histogram")
}

fn summarize_histogram(hist: &Histogram<u64>) -> HistogramSummary {
    HistogramSummary {
        count: hist.len(),
        mean: hist.mean(),
        min: hist.min(),
        max: hist.max(),
        std_dev: hist.stdev(),
        p50: hist.value_at_percentile(50.0),
        p90: hist.value_at_percentile(90.0),
        p95: hist.value_at_percentile(95.0),
        p99: hist.value_at_percentile(99.0),
        p999: hist.value_at_percentile(99.9),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MockClock;
    use std::time::Duration;

    fn micros(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn breakdown_arithmetic() {
        let b = OverheadBreakdown::builder()
            .total_latency(micros(1000))
            .server_traversal_time(micros(200))
            .client_traversal_time(micros(25))
            .server_fetch_time(micros(120))
            .wire_transmit_time(micros(75))
            .wire_receive_time(micros(75))
            .serialization_time(micros(100))
            .deserialization_time(micros(80))
            .connection_acquisition(micros(50))
            .connection_release(micros(20))
            .build();

        assert_eq!(b.traversal_overhead(), micros(225));
        assert_eq!(b.network_overhead(), micros(150));
        assert_eq!(b.serialization_overhead(), micros(180));
        assert_eq!(b.connection_overhead(), micros(70));
        assert_eq!(b.total_overhead(), micros(880));
        assert!((b.traversal_percentage() - 22.5).abs() < 1e-9);
    }

    #[test]
    fn percentages_are_zero_for_zero_total() {
        let b = OverheadBreakdown::builder()
            .server_traversal_time(micros(10))
            .build();
        assert_eq!(b.traversal_percentage(), 0.0);
        assert_eq!(b.overhead_percentage(), 0.0);
        assert_eq!(b.network_percentage(), 0.0);
        assert_eq!(b.serialization_percentage(), 0.0);
    }

    #[test]
    fn platform_map_is_defensively_owned() {
        let mut source = BTreeMap::new();
        source.insert("x.custom".to_string(), micros(5));
        let b = OverheadBreakdown::builder()
            .platform_specific(source.clone())
            .build();
        source.insert("x.other".to_string(), micros(9));
        source.remove("x.custom");
        assert_eq!(b.platform_specific().len(), 1);
        assert_eq!(b.platform_specific().get("x.custom"), Some(&micros(5)));
    }

    #[test]
    fn recorded_samples_summarize() {
        let collector = MetricsCollector::new();
        for _ in 0..10 {
            collector.record("m", micros(100));
        }
        let summary = collector.summarize();
        let h = summary.histogram("m").unwrap();
        assert_eq!(h.count, 10);
        assert!(h.min <= 100_000 && 100_000 <= h.max);
        assert!((h.mean - 100_000.0).abs() / 100_000.0 < 0.01);
    }

    #[test]
    fn percentile_accuracy_over_uniform_values() {
        let collector = MetricsCollector::new();
        for v in 1..=100u64 {
            collector.record("m", micros(v));
        }
        let summary = collector.summarize();
        let h = summary.histogram("m").unwrap();
        assert!(h.p50 >= 49_000 && h.p50 <= 51_000, "p50={}", h.p50);
        assert!(h.p99 >= 98_000 && h.p99 <= 100_100, "p99={}", h.p99);
    }

    #[test]
    fn negative_nanos_coerce_to_zero() {
        let collector = MetricsCollector::new();
        collector.record_nanos("m", -42);
        let h = collector.summarize().histograms.remove("m").unwrap();
        assert_eq!(h.count, 1);
        assert_eq!(h.max, 0);
    }

    #[test]
    fn values_above_one_hour_saturate() {
        let collector = MetricsCollector::new();
        collector.record("m", Duration::from_secs(7200));
        let h = collector.summarize().histograms.remove("m").unwrap();
        assert_eq!(h.count, 1);
        let cap = MAX_RECORDABLE_NANOS as f64;
        assert!((h.max as f64 - cap).abs() / cap < 0.01, "max={}", h.max);
    }

    #[test]
    fn reset_drops_everything() {
        let collector = MetricsCollector::new();
        collector.record("m", micros(1));
        collector.increment_counter("c");
        collector.reset();
        let summary = collector.summarize();
        assert!(summary.is_empty());
        assert_eq!(collector.counter("c"), 0);
    }

    #[test]
    fn counters_accumulate() {
        let collector = MetricsCollector::new();
        collector.increment_counter("ops");
        collector.add_counter("ops", 4);
        assert_eq!(collector.counter("ops"), 5);
        assert_eq!(collector.counter("missing"), 0);
    }

    #[test]
    fn record_breakdown_fills_conventional_buckets() {
        let collector = MetricsCollector::new();
        let b = OverheadBreakdown::builder()
            .total_latency(micros(1000))
            .server_traversal_time(micros(200))
            .client_traversal_time(micros(25))
            .add_platform_specific("seqscan.store_read", micros(7))
            .build();
        collector.record_breakdown(&b);
        let summary = collector.summarize();
        assert_eq!(summary.histogram("total_latency").unwrap().count, 1);
        assert_eq!(summary.histogram("server_traversal").unwrap().count, 1);
        let traversal = summary.histogram("total_traversal").unwrap();
        assert!(traversal.max >= 224_000 && traversal.max <= 226_000);
        assert_eq!(summary.histogram("seqscan.store_read").unwrap().count, 1);
    }

    #[test]
    fn time_operation_records_and_passes_through() {
        let clock = Arc::new(MockClock::new(0));
        let collector = MetricsCollector::with_clock(clock.clone());
        let out = collector.time_operation("op", || {
            clock.advance(micros(30));
            17
        });
        assert_eq!(out, 17);
        let h = collector.summarize().histograms.remove("op").unwrap();
        assert_eq!(h.count, 1);
        assert!(h.max >= 29_000 && h.max <= 31_000);
    }

    #[test]
    fn concurrent_recording_is_complete() {
        let collector = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let collector = Arc::clone(&collector);
            handles.push(std::thread::spawn(move || {
                for i in 0..500u64 {
                    collector.record("shared", Duration::from_nanos(i + 1));
                    collector.record(&format!("thread_{t}"), Duration::from_nanos(i + 1));
                    collector.increment_counter("total");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let summary = collector.summarize();
        assert_eq!(summary.histogram("shared").unwrap().count, 8 * 500);
        assert_eq!(summary.counter("total"), 8 * 500);
        for t in 0..8 {
            assert_eq!(
                summary.histogram(&format!("thread_{t}")).unwrap().count,
                500
            );
        }
    }
}
