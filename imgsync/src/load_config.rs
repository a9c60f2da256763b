//! `load_config` module: loads the static YAML config file into typed structs
//! shared with `imgsync-core`.
//!
//! This is the only place where untrusted YAML is parsed and mapped to rich,
//! strongly-typed internal structs.
//!
//! # Responsibilities
//! - Parse user-supplied YAML configuration files into type-safe Rust structs
//! - Apply schema defaults (remote prefix, extension allow-list, manifest path)
//! - Ensure robust error messages for CLI and tests: any failure in loading
//!   must result in clear diagnostics.
//!
//! # Errors
//! All errors in this module use `anyhow::Error` for context-rich diagnostics,
//! and are surfaced at the CLI boundary.

use anyhow::Result;
use imgsync_core::config::SyncConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Full CLI configuration: the bucket to target, the shared sync settings and
/// an optional manifest destination.
#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub bucket: String,
    #[serde(flatten)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
}

impl CliConfig {
    /// Resolves the manifest artifact path for the chosen layout. An explicit
    /// `manifest_path` wins; otherwise each layout has its own default so the
    /// two artifacts never overwrite each other.
    pub fn manifest_path_for(&self, flat: bool) -> PathBuf {
        match &self.manifest_path {
            Some(path) => path.clone(),
            None if flat => PathBuf::from("image_urls.json"),
            None => PathBuf::from("structured_image_urls.json"),
        }
    }
}

/// Loads a static YAML config file and applies the schema defaults.
/// Returns a processable CLI config for use by the CLI.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}
