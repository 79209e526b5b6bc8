// Prometheus metrics definitions for the raid bot.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Nations in the current snapshot (0 until the cache is ready).
    pub static ref SNAPSHOT_NATIONS: IntGauge =
        IntGauge::new("raiden_snapshot_nations", "Nations in the current snapshot").unwrap();

    /// Unix timestamp of the last successful refresh.
    pub static ref SNAPSHOT_LAST_UPDATE_SECONDS: IntGauge = IntGauge::new(
        "raiden_snapshot_last_update_seconds",
        "Unix time of the last successful refresh",
    )
    .unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Refresh cycles, by result (success, unchanged, failed).
    pub static ref REFRESHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("raiden_refreshes_total", "Refresh cycles by result"),
        &["result"],
    )
    .unwrap();

    /// Bulk collection downloads that failed, by collection.
    pub static ref COLLECTION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("raiden_collection_failures_total", "Failed bulk collection downloads"),
        &["collection"],
    )
    .unwrap();

    /// Bulk rows skipped as malformed, by collection.
    pub static ref ROWS_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("raiden_rows_skipped_total", "Malformed bulk rows skipped"),
        &["collection"],
    )
    .unwrap();

    /// Raid searches, by result (ok or an error kind).
    pub static ref RAID_SEARCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("raiden_raid_searches_total", "Raid searches by result"),
        &["result"],
    )
    .unwrap();

    /// Chat commands, by command name and result.
    pub static ref COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("raiden_commands_total", "Chat commands by name and result"),
        &["command", "result"],
    )
    .unwrap();

    /// Upstream requests retried after throttling.
    pub static ref UPSTREAM_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "raiden_upstream_retries_total",
        "Upstream requests retried after throttling",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Raid search duration in milliseconds (filter, estimate and rank).
    pub static ref RAID_SEARCH_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("raiden_raid_search_duration_ms", "Raid search time in ms")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
    )
    .unwrap();

    /// Full refresh duration in seconds.
    pub static ref REFRESH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("raiden_refresh_duration_seconds", "Refresh time in seconds")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SNAPSHOT_NATIONS.clone()),
        Box::new(SNAPSHOT_LAST_UPDATE_SECONDS.clone()),
        Box::new(REFRESHES_TOTAL.clone()),
        Box::new(COLLECTION_FAILURES_TOTAL.clone()),
        Box::new(ROWS_SKIPPED_TOTAL.clone()),
        Box::new(RAID_SEARCHES_TOTAL.clone()),
        Box::new(COMMANDS_TOTAL.clone()),
        Box::new(UPSTREAM_RETRIES_TOTAL.clone()),
        Box::new(RAID_SEARCH_DURATION_MS.clone()),
        Box::new(REFRESH_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        // Registering twice (tests, restarts of the ops server) is harmless.
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("Metric already registered: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        register_metrics();
        REFRESHES_TOTAL.with_label_values(&["success"]).inc();
        let output = gather_metrics();
        assert!(output.contains("raiden_refreshes_total"));
    }

    #[test]
    fn test_metric_increments() {
        SNAPSHOT_NATIONS.set(12);
        assert_eq!(SNAPSHOT_NATIONS.get(), 12);

        COLLECTION_FAILURES_TOTAL.with_label_values(&["cities"]).inc();
        ROWS_SKIPPED_TOTAL.with_label_values(&["nations"]).inc_by(3);
        RAID_SEARCHES_TOTAL.with_label_values(&["ok"]).inc();
        COMMANDS_TOTAL.with_label_values(&["raid", "ok"]).inc();
        UPSTREAM_RETRIES_TOTAL.inc();

        RAID_SEARCH_DURATION_MS.observe(1.5);
        REFRESH_DURATION_SECONDS.observe(42.0);
    }
}
