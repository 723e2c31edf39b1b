use std::sync::Arc;
use strum::{Display, IntoStaticStr};

use crate::config::AppConfig;
use crate::models::order::OrderJob;
use crate::services::codec::{CodecError, ImageCodec};
use crate::services::downloader::{DownloadError, Downloader};
use crate::services::geometry::{crop_rect, CropRect, GeometryError};
use crate::services::storage::{ArtifactStore, StorageError};

/// Pipeline stage, attached to failures for logging.
#[derive(Debug, Clone, Copy, Display, IntoStaticStr, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum JobStep {
    Download,
    Metadata,
    Crop,
}

/// Runs one order through download -> metadata -> crop.
pub struct OrderProcessor {
    downloader: Arc<dyn Downloader>,
    codec: Arc<dyn ImageCodec>,
    store: Arc<ArtifactStore>,
    master_url_template: String,
}

impl OrderProcessor {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        codec: Arc<dyn ImageCodec>,
        store: Arc<ArtifactStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            downloader,
            codec,
            store,
            master_url_template: config.master_url_template.clone(),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn master_url(&self, job: &OrderJob) -> String {
        crate::config::render_master_url(&self.master_url_template, &job.master_asset_id)
    }

    /// Execute every step for `job`.
    ///
    /// On failure the order's artifact directory is removed if this attempt
    /// created it. A directory left by an earlier attempt is never deleted.
    pub async fn process(&self, job: &OrderJob) -> Result<CropRect, JobError> {
        let fresh = !self.store.exists(&job.order_id).await;
        let result = self.run_steps(job).await;
        if result.is_err() {
            self.cleanup(&job.order_id, fresh).await;
        }
        result
    }

    /// Remove artifacts of a failed attempt that started from an empty slot.
    pub async fn cleanup(&self, order_id: &str, fresh: bool) {
        if !fresh {
            tracing::warn!(order_id, "Keeping artifact directory from an earlier attempt");
            return;
        }
        if let Err(e) = self.store.discard(order_id).await {
            tracing::warn!(order_id, error = %e, "Failed to clean up artifacts");
        }
    }

    async fn run_steps(&self, job: &OrderJob) -> Result<CropRect, JobError> {
        let order_id = job.order_id.as_str();

        let url = self.master_url(job);
        tracing::debug!(order_id, url = %url, "Downloading master image");
        self.store
            .prepare(order_id)
            .await
            .map_err(|e| JobError::Storage { step: JobStep::Download, source: e })?;
        let master_path = self.store.master_path(order_id);
        let bytes = self.downloader.fetch(&url, &master_path).await?;

        let metadata_path = self
            .store
            .write_metadata(job)
            .await
            .map_err(|e| JobError::Storage { step: JobStep::Metadata, source: e })?;
        tracing::debug!(order_id, path = %metadata_path.display(), "Metadata written");

        let (width, height) = self.codec.read_dimensions(&master_path).await?;
        let rect = crop_rect(&job.crop_ratio, width, height)?;
        tracing::debug!(
            order_id,
            master_bytes = bytes,
            width,
            height,
            left = rect.left,
            top = rect.top,
            crop_width = rect.width,
            crop_height = rect.height,
            "Cropping master image"
        );

        self.codec
            .extract(&master_path, rect, job.output_size, &self.store.cropped_path(order_id))
            .await?;

        Ok(rect)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("{step} step failed: {source}")]
    Storage {
        step: JobStep,
        #[source]
        source: StorageError,
    },

    #[error("crop geometry invalid: {0}")]
    Geometry(#[from] GeometryError),

    #[error("image codec failed: {0}")]
    Codec(#[from] CodecError),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn step(&self) -> Option<JobStep> {
        match self {
            Self::Download(_) => Some(JobStep::Download),
            Self::Storage { step, .. } => Some(*step),
            Self::Geometry(_) | Self::Codec(_) => Some(JobStep::Crop),
            Self::Panicked(_) => None,
        }
    }
}
