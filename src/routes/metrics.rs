use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus scrape endpoint (text exposition format).
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the metrics the job queue records.
pub fn describe() {
    metrics::describe_counter!("order_jobs_submitted_total", "Order jobs submitted via webhook");
    metrics::describe_counter!(
        "order_jobs_duplicate_total",
        "Submissions ignored because the order already completed"
    );
    metrics::describe_counter!("order_jobs_completed_total", "Order jobs that produced artifacts");
    metrics::describe_counter!("order_jobs_failed_total", "Order jobs that failed");
    metrics::describe_gauge!("order_queue_depth", "Order jobs waiting for the worker");
    metrics::describe_histogram!(
        "order_job_processing_seconds",
        "Time to download, crop and write one order's artifacts"
    );
}
