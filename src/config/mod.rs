use serde::Deserialize;
use std::path::PathBuf;

/// Placeholder substituted with the master asset id in `master_url_template`.
pub const MASTER_ASSET_PLACEHOLDER: &str = "{master_asset_id}";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Interface to listen on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shopify webhook signing secret. Signature checks are skipped when unset.
    #[serde(default)]
    pub shopify_webhook_secret: Option<String>,

    /// Base directory holding one artifact directory per order
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Remote master image location, with `{master_asset_id}` as placeholder
    #[serde(default = "default_master_url_template")]
    pub master_url_template: String,

    /// Filename prefix for downloaded bundles (`<prefix>-<order_id>.zip`)
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,

    /// Maximum accepted webhook body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("/tmp/wandini")
}

fn default_master_url_template() -> String {
    "https://storage.googleapis.com/wandini-masters/{master_asset_id}/master.png".to_string()
}

fn default_download_prefix() -> String {
    "wandini".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shopify_webhook_secret: None,
            artifact_dir: default_artifact_dir(),
            master_url_template: default_master_url_template(),
            download_prefix: default_download_prefix(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>().map(Self::normalized)
    }

    fn normalized(mut self) -> Self {
        if self
            .shopify_webhook_secret
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            self.shopify_webhook_secret = None;
        }
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the remote URL of a master image.
pub fn render_master_url(template: &str, master_asset_id: &str) -> String {
    template.replace(MASTER_ASSET_PLACEHOLDER, master_asset_id)
}
