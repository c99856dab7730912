//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Total HTTP requests handled (monotonic)
    requests_total: AtomicU64,
    /// Requests since last report (reset on report)
    requests_since_report: AtomicU64,
    /// Sum of request latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max request latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Request latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Occupancy events applied, by action (monotonic)
    enter_total: AtomicU64,
    exit_total: AtomicU64,
    manual_set_total: AtomicU64,
    reset_total: AtomicU64,
    /// Requests rejected by validation (monotonic)
    validation_rejections: AtomicU64,
    /// Ledger load/save failures (monotonic)
    store_errors: AtomicU64,
    /// Visitor count after the most recent mutation
    current_visitors: AtomicU64,
    /// Capacity after the most recent mutation
    max_capacity: AtomicU64,
    /// Restaurant label for exported metrics, refreshed on every persisted mutation
    restaurant: parking_lot::RwLock<String>,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            enter_total: AtomicU64::new(0),
            exit_total: AtomicU64::new(0),
            manual_set_total: AtomicU64::new(0),
            reset_total: AtomicU64::new(0),
            validation_rejections: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            current_visitors: AtomicU64::new(0),
            max_capacity: AtomicU64::new(0),
            restaurant: parking_lot::RwLock::new(String::new()),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a handled HTTP request with its latency
    #[inline]
    pub fn record_request(&self, latency_us: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
    }

    /// Record an applied occupancy event and the resulting gauges
    #[inline]
    pub fn record_event(&self, action: Action, current_visitors: u32, max_capacity: u32) {
        let counter = match action {
            Action::Enter => &self.enter_total,
            Action::Exit => &self.exit_total,
            Action::ManualSet => &self.manual_set_total,
            Action::Reset => &self.reset_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.set_occupancy(current_visitors, max_capacity);
    }

    #[inline]
    pub fn set_occupancy(&self, current_visitors: u32, max_capacity: u32) {
        self.current_visitors.store(current_visitors as u64, Ordering::Relaxed);
        self.max_capacity.store(max_capacity as u64, Ordering::Relaxed);
    }

    pub fn set_restaurant(&self, name: &str) {
        if *self.restaurant.read() != name {
            *self.restaurant.write() = name.to_string();
        }
    }

    pub fn restaurant(&self) -> String {
        self.restaurant.read().clone()
    }

    #[inline]
    pub fn record_validation_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn events_total(&self) -> u64 {
        self.enter_total.load(Ordering::Relaxed)
            + self.exit_total.load(Ordering::Relaxed)
            + self.manual_set_total.load(Ordering::Relaxed)
            + self.reset_total.load(Ordering::Relaxed)
    }

    /// Generate a summary and reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        let requests_count = self.requests_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        self.summarize(requests_count, latency_sum, max_latency, lat_buckets, elapsed.as_secs_f64())
    }

    /// Summary of the current window without resetting anything (used by scrapes)
    pub fn snapshot(&self) -> MetricsSummary {
        let elapsed = self.last_report_time.lock().elapsed();
        self.summarize(
            self.requests_since_report.load(Ordering::Relaxed),
            self.latency_sum_us.load(Ordering::Relaxed),
            self.latency_max_us.load(Ordering::Relaxed),
            load_buckets(&self.latency_buckets),
            elapsed.as_secs_f64(),
        )
    }

    fn summarize(
        &self,
        requests_count: u64,
        latency_sum: u64,
        max_latency: u64,
        lat_buckets: [u64; NUM_BUCKETS],
        elapsed_secs: f64,
    ) -> MetricsSummary {
        let requests_per_sec =
            if elapsed_secs > 0.0 { requests_count as f64 / elapsed_secs } else { 0.0 };
        let avg_latency_us = if requests_count > 0 { latency_sum / requests_count } else { 0 };

        MetricsSummary {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_per_sec,
            avg_latency_us,
            max_latency_us: max_latency,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            enter_total: self.enter_total.load(Ordering::Relaxed),
            exit_total: self.exit_total.load(Ordering::Relaxed),
            manual_set_total: self.manual_set_total.load(Ordering::Relaxed),
            reset_total: self.reset_total.load(Ordering::Relaxed),
            validation_rejections: self.validation_rejections.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            current_visitors: self.current_visitors.load(Ordering::Relaxed),
            max_capacity: self.max_capacity.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub requests_total: u64,
    pub requests_per_sec: f64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    /// Request latency histogram buckets
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    pub enter_total: u64,
    pub exit_total: u64,
    pub manual_set_total: u64,
    pub reset_total: u64,
    pub validation_rejections: u64,
    pub store_errors: u64,
    pub current_visitors: u64,
    pub max_capacity: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            requests_total = %self.requests_total,
            requests_per_sec = format!("{:.1}", self.requests_per_sec),
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            p99_us = %self.lat_p99_us,
            enters = %self.enter_total,
            exits = %self.exit_total,
            current_visitors = %self.current_visitors,
            max_capacity = %self.max_capacity,
            store_errors = %self.store_errors,
            "metrics"
        );
    }
}
