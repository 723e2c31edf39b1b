use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::order::OrderJob;
use crate::services::metadata::render_order_xml;

pub const MASTER_FILE: &str = "master.png";
pub const CROPPED_FILE: &str = "cropped.png";
pub const METADATA_FILE: &str = "order.xml";

/// Per-order artifact directories under a common base directory.
///
/// Layout: `{base}/{order_id}/{master.png, cropped.png, order.xml}`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the base directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn order_dir(&self, order_id: &str) -> PathBuf {
        self.base_dir.join(order_id)
    }

    pub fn master_path(&self, order_id: &str) -> PathBuf {
        self.order_dir(order_id).join(MASTER_FILE)
    }

    pub fn cropped_path(&self, order_id: &str) -> PathBuf {
        self.order_dir(order_id).join(CROPPED_FILE)
    }

    pub fn metadata_path(&self, order_id: &str) -> PathBuf {
        self.order_dir(order_id).join(METADATA_FILE)
    }

    pub async fn exists(&self, order_id: &str) -> bool {
        tokio::fs::try_exists(self.order_dir(order_id))
            .await
            .unwrap_or(false)
    }

    /// Create the order's directory.
    pub async fn prepare(&self, order_id: &str) -> Result<PathBuf, StorageError> {
        let dir = self.order_dir(order_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Write `order.xml` for the job. Readers never see a partial file.
    pub async fn write_metadata(&self, job: &OrderJob) -> Result<PathBuf, StorageError> {
        let path = self.metadata_path(&job.order_id);
        let partial = partial_path(&path);
        tokio::fs::write(&partial, render_order_xml(job)).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(path)
    }

    /// Both bundle files are on disk, whichever process run wrote them.
    pub async fn is_complete(&self, order_id: &str) -> bool {
        for path in [self.metadata_path(order_id), self.cropped_path(order_id)] {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return false;
            }
        }
        true
    }

    /// Ids of every order whose bundle is complete on disk.
    pub fn completed_orders(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(order_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.metadata_path(&order_id).is_file() && self.cropped_path(&order_id).is_file() {
                ids.push(order_id);
            }
        }
        Ok(ids)
    }

    /// Remove everything stored for an order. Missing directories are fine.
    pub async fn discard(&self, order_id: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_dir_all(self.order_dir(order_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Build the download bundle: `order.xml` and `cropped.png`, nothing else.
    ///
    /// Built fresh on every call.
    pub async fn package(&self, order_id: &str) -> Result<Vec<u8>, StorageError> {
        if !self.exists(order_id).await {
            return Err(StorageError::NotFound(order_id.to_string()));
        }

        let metadata = self.metadata_path(order_id);
        let cropped = self.cropped_path(order_id);
        for path in [&metadata, &cropped] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(StorageError::Incomplete(order_id.to_string()));
            }
        }

        tokio::task::spawn_blocking(move || build_zip(&metadata, &cropped)).await?
    }
}

/// Sibling path a file is written to before being renamed into place.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn build_zip(metadata: &Path, cropped: &Path) -> Result<Vec<u8>, StorageError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    // PNG is already compressed
    let entries = [
        (METADATA_FILE, metadata, CompressionMethod::Deflated),
        (CROPPED_FILE, cropped, CompressionMethod::Stored),
    ];
    for (name, path, method) in entries {
        let bytes = std::fs::read(path)?;
        zip.start_file(name, SimpleFileOptions::default().compression_method(method))?;
        zip.write_all(&bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("No artifacts for order {0}")]
    NotFound(String),

    #[error("Artifacts for order {0} are not ready")]
    Incomplete(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Packaging task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
