// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metric descriptions so every series is labelled in the export.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "tracker_fetch_attempts_total",
            "HTTP attempts against the search endpoint."
        );
        describe_counter!(
            "tracker_fetch_retries_total",
            "Attempts that were retried after a transient failure."
        );
        describe_counter!(
            "tracker_fetch_fatal_total",
            "Pages abandoned after a fatal or exhausted failure."
        );
        describe_counter!("tracker_records_total", "Records parsed from search pages.");
        describe_counter!(
            "tracker_records_malformed_total",
            "Records skipped because they could not be parsed."
        );
        describe_counter!(
            "tracker_dedup_dropped_total",
            "Duplicate records dropped within a term."
        );
        describe_counter!(
            "tracker_unbucketable_total",
            "Records without a usable publication date."
        );
        describe_histogram!("tracker_fetch_ms", "Search request latency in milliseconds.");
        describe_histogram!("tracker_parse_ms", "Search page parse time in milliseconds.");
        describe_gauge!("tracker_run_last_ts", "Unix ts when the last run finished.");
    });
}

/// Install the global Prometheus recorder. Only the first call per process
/// can succeed.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    ensure_described();
    Ok(handle)
}
