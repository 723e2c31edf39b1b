//! Test doubles and an in-process server fixture

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tower::ServiceExt;

use wandini_orchestrator::app_state::AppState;
use wandini_orchestrator::config::AppConfig;
use wandini_orchestrator::models::job::JobEvent;
use wandini_orchestrator::routes;
use wandini_orchestrator::services::codec::PngCodec;
use wandini_orchestrator::services::downloader::{DownloadError, Downloader};
use wandini_orchestrator::services::pipeline::OrderProcessor;
use wandini_orchestrator::services::storage::ArtifactStore;

pub const MASTER_URL_TEMPLATE: &str = "https://assets.test/{master_asset_id}/master.png";

/// Write a gradient PNG whose red/green channels encode the pixel position.
pub fn write_png(path: &Path, width: u32, height: u32) -> u64 {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
    img.save_with_format(path, ImageFormat::Png).unwrap();
    std::fs::metadata(path).unwrap().len()
}

/// Downloader double: writes a generated PNG instead of hitting the network.
///
/// URLs for assets marked failing get a 404; the asset id `panic` panics.
pub struct FakeDownloader {
    pub size: (u32, u32),
    pub delay: Duration,
    failing: Mutex<HashSet<String>>,
    urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            size: (40, 30),
            delay,
            failing: Mutex::new(HashSet::new()),
            urls: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn fail_asset(&self, asset: &str) {
        self.failing.lock().unwrap().insert(asset.to_string());
    }

    pub fn heal_asset(&self, asset: &str) {
        self.failing.lock().unwrap().remove(asset);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if url.contains("/panic/") {
            panic!("simulated downloader crash");
        }

        let failing = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|asset| url.contains(&format!("/{asset}/")));
        if failing {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: 404,
            });
        }

        Ok(write_png(dest, self.size.0, self.size.1))
    }
}

pub fn test_config(temp_dir: &TempDir) -> AppConfig {
    AppConfig {
        artifact_dir: temp_dir.path().join("artifacts"),
        master_url_template: MASTER_URL_TEMPLATE.to_string(),
        ..AppConfig::default()
    }
}

/// Processor wired to a fake downloader and the real PNG codec.
pub fn processor(
    temp_dir: &TempDir,
    downloader: Arc<FakeDownloader>,
) -> (Arc<OrderProcessor>, Arc<ArtifactStore>) {
    let config = test_config(temp_dir);
    let store = Arc::new(ArtifactStore::new(&config.artifact_dir).unwrap());
    let processor = Arc::new(OrderProcessor::new(
        downloader,
        Arc::new(PngCodec),
        Arc::clone(&store),
        &config,
    ));
    (processor, store)
}

/// Wait for the next finished attempt of `order_id`.
pub async fn wait_for_event(rx: &mut broadcast::Receiver<JobEvent>, order_id: &str) -> JobEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) if event.order_id == order_id => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for job event")
}

/// In-process server with a fake downloader.
pub struct TestFixture {
    pub router: Router,
    pub state: AppState,
    pub downloader: Arc<FakeDownloader>,
    pub max_body_bytes: usize,
    pub temp_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_secret(secret: &str) -> Self {
        Self::build(Some(secret.to_string())).await
    }

    async fn build(secret: Option<String>) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            shopify_webhook_secret: secret,
            ..test_config(&temp_dir)
        };
        let downloader = Arc::new(FakeDownloader::new());
        let state = AppState::from_config(&config, downloader.clone(), Arc::new(PngCodec)).unwrap();
        let router = routes::router(state.clone(), config.max_body_bytes);

        Self {
            router,
            state,
            downloader,
            max_body_bytes: config.max_body_bytes,
            temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_webhook(&self, body: &[u8], signature: Option<&str>) -> TestResponse {
        let mut request = Request::post("/webhooks/orders-paid").header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("x-shopify-hmac-sha256", signature);
        }
        self.send(request.body(Body::from(body.to_vec())).unwrap()).await
    }

    pub async fn post_order(&self, payload: &Value) -> TestResponse {
        self.post_webhook(payload.to_string().as_bytes(), None).await
    }
}
