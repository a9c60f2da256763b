use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

fn default_remote_prefix() -> String {
    "images".to_string()
}

fn default_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub assets_dir: PathBuf,
    #[serde(default = "default_remote_prefix")]
    pub remote_prefix: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl SyncConfig {
    /// A config with the stock remote prefix and extension allow-list.
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        SyncConfig {
            assets_dir: assets_dir.into(),
            remote_prefix: default_remote_prefix(),
            extensions: default_extensions(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            assets_dir = %self.assets_dir.display(),
            remote_prefix = %self.remote_prefix,
            extensions = ?self.extensions,
            "Loaded SyncConfig"
        );
        debug!(config = ?self, "SyncConfig loaded (full debug)");
    }
}
