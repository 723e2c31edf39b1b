use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    codec::ImageCodec,
    downloader::Downloader,
    pipeline::OrderProcessor,
    queue::JobQueue,
    signature::{SignatureError, WebhookVerifier},
    storage::{ArtifactStore, StorageError},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub store: Arc<ArtifactStore>,
    pub verifier: Option<Arc<WebhookVerifier>>,
    pub download_prefix: Arc<str>,
}

impl AppState {
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<ArtifactStore>,
        verifier: Option<WebhookVerifier>,
        download_prefix: &str,
    ) -> Self {
        Self {
            queue,
            store,
            verifier: verifier.map(Arc::new),
            download_prefix: Arc::from(download_prefix),
        }
    }

    /// Wire the artifact store, processor and worker from configuration.
    ///
    /// Spawns the queue worker, so it must be called inside a Tokio runtime.
    pub fn from_config(
        config: &AppConfig,
        downloader: Arc<dyn Downloader>,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<Self, StartupError> {
        let store = Arc::new(ArtifactStore::new(&config.artifact_dir)?);
        let verifier = config
            .shopify_webhook_secret
            .as_deref()
            .map(WebhookVerifier::new)
            .transpose()?;

        let processor = Arc::new(OrderProcessor::new(
            downloader,
            codec,
            Arc::clone(&store),
            config,
        ));
        let queue = JobQueue::start(processor);

        Ok(Self::new(queue, store, verifier, &config.download_prefix))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Artifact directory unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Webhook verifier: {0}")]
    Signature(#[from] SignatureError),
}
