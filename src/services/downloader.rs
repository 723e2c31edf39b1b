use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Fetches a remote resource into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// Non-success HTTP statuses are errors. On error `dest` may hold a
    /// partial file; callers own cleanup of the destination directory.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// HTTP(S) downloader backed by `reqwest`.
pub struct HttpDownloader {
    http: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, DownloadError> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownloadError::Http)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let mut response = self.http.get(url).send().await.map_err(DownloadError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(DownloadError::Http)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = written, dest = %dest.display(), "Download complete");
        Ok(written)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to write download: {0}")]
    Io(#[from] std::io::Error),
}
