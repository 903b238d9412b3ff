//! Prometheus metrics for shard routing.
//!
//! All metrics follow the naming convention: `shard_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., operations_total)
//! - **Gauge**: Value that can go up or down (e.g., shard count)
//! - **Histogram**: Distribution of values (e.g., rebalance duration)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ROUTER METRICS
    // =========================================================================

    /// Routed CRUD operations
    pub static ref SHARD_OPERATIONS: CounterVec = CounterVec::new(
        Opts::new("shard_router_operations_total", "Routed operations by kind and outcome"),
        &["operation", "outcome"]  // outcome: ok/error
    ).expect("metric creation failed");

    /// Current number of shards in the topology
    pub static ref SHARD_COUNT: Gauge = Gauge::new(
        "shard_router_shards",
        "Number of shards in the current topology"
    ).expect("metric creation failed");

    // =========================================================================
    // REBALANCE METRICS
    // =========================================================================

    /// Records migrated by rebalancing
    pub static ref RECORDS_MIGRATED: CounterVec = CounterVec::new(
        Opts::new("shard_rebalance_records_total", "Rebalance steps by kind"),
        &["kind"]  // kind: moved/discarded/skipped
    ).expect("metric creation failed");

    /// Rebalance runs
    pub static ref REBALANCE_RUNS: CounterVec = CounterVec::new(
        Opts::new("shard_rebalance_runs_total", "Rebalance runs by outcome"),
        &["outcome"]  // outcome: success/partial_failure/aborted/error
    ).expect("metric creation failed");

    /// Rebalance duration histogram
    pub static ref REBALANCE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "shard_rebalance_duration_seconds",
            "Wall-clock time of rebalance runs"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0])
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered.
#[derive(Debug)]
pub struct MetricsHandle {
    registered: usize,
}

impl MetricsHandle {
    /// Number of collectors registered by this call.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Router
        Box::new(SHARD_OPERATIONS.clone()),
        Box::new(SHARD_COUNT.clone()),
        // Rebalance
        Box::new(RECORDS_MIGRATED.clone()),
        Box::new(REBALANCE_RUNS.clone()),
        Box::new(REBALANCE_DURATION.clone()),
    ];

    let mut registered = 0;
    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) => registered += 1,
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { registered })
}

/// Count one routed operation.
pub fn record_operation(operation: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    SHARD_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record the outcome of a rebalance run.
pub fn record_rebalance(outcome: &str, moved: usize, discarded: usize, skipped: usize) {
    REBALANCE_RUNS.with_label_values(&[outcome]).inc();
    RECORDS_MIGRATED
        .with_label_values(&["moved"])
        .inc_by(moved as f64);
    RECORDS_MIGRATED
        .with_label_values(&["discarded"])
        .inc_by(discarded as f64);
    RECORDS_MIGRATED
        .with_label_values(&["skipped"])
        .inc_by(skipped as f64);
}

/// Set the shard count gauge.
pub fn set_shard_count(count: usize) {
    SHARD_COUNT.set(count as f64);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
