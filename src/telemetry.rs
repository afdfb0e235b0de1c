use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// JSON logs filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();
}

/// Install the global Prometheus recorder and register metric descriptions.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Install the global recorder behind its own scrape endpoint on `addr`.
///
/// Used by processes that do not serve the HTTP API. Must be called from
/// inside a Tokio runtime.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!("jobs_submitted_total", "Total jobs accepted for fan-out");
    metrics::describe_counter!("items_published_total", "Total item messages published");
    metrics::describe_counter!(
        "items_processed_total",
        "Items processed and counted, labelled by validity"
    );
    metrics::describe_counter!(
        "items_skipped_total",
        "Redelivered items skipped, labelled by reason"
    );
    metrics::describe_counter!("items_failed_total", "Item deliveries that failed processing");
    metrics::describe_counter!(
        "items_dead_lettered_total",
        "Messages moved to the dead-letter list"
    );
    metrics::describe_counter!("jobs_completed_total", "Jobs that reached Completed");
    metrics::describe_histogram!(
        "item_processing_seconds",
        "Time to process a single item"
    );
    metrics::describe_gauge!("queue_depth", "Item messages waiting in the queue");
}
