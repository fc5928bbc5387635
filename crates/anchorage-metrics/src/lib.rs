//! # Anchorage Metrics - Injected Sink Capability
//!
//! A passive observer recording counts, byte volumes, durations, and cost
//! gauges for the storage layer. The sink is injected at construction
//! rather than reached through a global registry, so every component is
//! testable in isolation. [`MemoryMetrics`] keeps a queryable snapshot for
//! tests; [`NoopMetrics`] is the default when nothing consumes metrics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metric names used throughout the storage layer.
pub mod names {
    /// Total successful uploads.
    pub const STORAGE_UPLOADS: &str = "anchorage_storage_uploads_total";
    /// Total successful downloads.
    pub const STORAGE_DOWNLOADS: &str = "anchorage_storage_downloads_total";
    /// Total bytes moved, labeled by operation.
    pub const STORAGE_BYTES: &str = "anchorage_storage_bytes_total";
    /// Total storage operation errors, labeled by operation.
    pub const STORAGE_ERRORS: &str = "anchorage_storage_errors_total";
    /// Storage operation duration in seconds, labeled by operation.
    pub const STORAGE_DURATION_SECONDS: &str = "anchorage_storage_duration_seconds";
    /// Per-user storage quota usage in percent.
    pub const QUOTA_USAGE_PERCENT: &str = "anchorage_quota_usage_percent";
    /// Accumulated cost in USD, labeled by resource.
    pub const COST_TOTAL_USD: &str = "anchorage_cost_total_usd";
    /// Backup ledger rows recorded.
    pub const BACKUPS_RECORDED: &str = "anchorage_backups_recorded_total";
    /// Backup ledger rows verified.
    pub const BACKUPS_VERIFIED: &str = "anchorage_backups_verified_total";
    /// Backup ledger rows that failed verification.
    pub const BACKUPS_FAILED: &str = "anchorage_backups_failed_total";
    /// Backup ledger rows purged by the retention sweep.
    pub const BACKUPS_PURGED: &str = "anchorage_backups_purged_total";
    /// Maintenance sweep duration in seconds, labeled by sweep.
    pub const MAINTENANCE_SWEEP_DURATION_SECONDS: &str =
        "anchorage_maintenance_sweep_duration_seconds";
}

/// Label pairs attached to a metric sample.
pub type Labels<'a> = &'a [(&'a str, &'a str)];

/// Capability for recording metric samples.
///
/// Implementations must be cheap and non-blocking; the storage layer
/// calls them from hot paths and never inspects the outcome.
pub trait MetricsSink: Send + Sync {
    /// Add `delta` to a named counter.
    fn counter(&self, name: &'static str, delta: u64, labels: Labels<'_>);

    /// Record one observation of a named histogram.
    fn histogram(&self, name: &'static str, value: f64, labels: Labels<'_>);

    /// Set a named gauge to `value`.
    fn gauge(&self, name: &'static str, value: f64, labels: Labels<'_>);
}

/// Sink that discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn counter(&self, _name: &'static str, _delta: u64, _labels: Labels<'_>) {}
    fn histogram(&self, _name: &'static str, _value: f64, _labels: Labels<'_>) {}
    fn gauge(&self, _name: &'static str, _value: f64, _labels: Labels<'_>) {}
}

fn series_key(name: &str, labels: Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}{{{}}}", rendered.join(","))
}

/// Aggregated view of one histogram series.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HistogramSummary {
    /// Number of recorded observations
    pub count: u64,
    /// Sum of recorded observations
    pub sum: f64,
}

/// In-memory recorder used by tests and the metrics snapshot surface.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    counters: RwLock<BTreeMap<String, u64>>,
    histograms: RwLock<BTreeMap<String, HistogramSummary>>,
    gauges: RwLock<BTreeMap<String, f64>>,
}

impl MemoryMetrics {
    /// Create an empty recorder behind an [`Arc`] for injection.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current value of a counter series, 0 when never touched.
    pub fn counter_value(&self, name: &str, labels: Labels<'_>) -> u64 {
        self.counters
            .read()
            .get(&series_key(name, labels))
            .copied()
            .unwrap_or(0)
    }

    /// Current value of a gauge series.
    pub fn gauge_value(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        self.gauges.read().get(&series_key(name, labels)).copied()
    }

    /// Aggregate of a histogram series.
    pub fn histogram_summary(&self, name: &str, labels: Labels<'_>) -> HistogramSummary {
        self.histograms
            .read()
            .get(&series_key(name, labels))
            .cloned()
            .unwrap_or_default()
    }

    /// All series rendered as a JSON object, for diagnostic surfaces.
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::json!({
            "counters": &*self.counters.read(),
            "histograms": &*self.histograms.read(),
            "gauges": &*self.gauges.read(),
        })
    }
}

impl MetricsSink for MemoryMetrics {
    fn counter(&self, name: &'static str, delta: u64, labels: Labels<'_>) {
        *self.counters.write().entry(series_key(name, labels)).or_insert(0) += delta;
    }

    fn histogram(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        let mut histograms = self.histograms.write();
        let entry = histograms.entry(series_key(name, labels)).or_default();
        entry.count += 1;
        entry.sum += value;
    }

    fn gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        self.gauges.write().insert(series_key(name, labels), value);
    }
}
