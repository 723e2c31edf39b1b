use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wandini_orchestrator::app_state::AppState;
use wandini_orchestrator::config::AppConfig;
use wandini_orchestrator::routes;
use wandini_orchestrator::services::{codec::PngCodec, downloader::HttpDownloader};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing wandini orchestrator");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    if config.shopify_webhook_secret.is_none() {
        tracing::warn!("SHOPIFY_WEBHOOK_SECRET not set, webhook signatures will not be checked");
    }

    let downloader = HttpDownloader::new().expect("Failed to initialize HTTP client");

    // Artifact store, processor and the worker task
    tracing::info!(artifact_dir = %config.artifact_dir.display(), "Starting order worker");
    let state = AppState::from_config(&config, Arc::new(downloader), Arc::new(PngCodec))
        .expect("Failed to initialize application state");

    let app = routes::router(state, config.max_body_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Orchestrator listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
