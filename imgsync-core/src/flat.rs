//! Legacy single-level layout: assets directly under the root, keys of the
//! shape `<prefix>/<file>`, one global identity scope.
//!
//! This is a sibling pipeline to [`crate::synchronise`], not a parameter of
//! it. The two layouts use distinct inventory, record and manifest types on
//! purpose: a structured key never feeds the flat inventory and vice versa,
//! so the modes cannot be conflated by accident.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::contract::ObjectStore;
use crate::error::SyncError;
use crate::inventory::{identity_of, scan_asset_files, LocalAsset};
use crate::manifest::write_json_artifact;
use crate::synchronise::{SyncOptions, UploadOutcome};

use serde::{Deserialize, Serialize};

/// Identities already present in the store under `<prefix>/<file>` keys.
/// Keys with any folder level below the prefix are ignored here; they belong
/// to the structured inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRemoteInventory {
    identities: BTreeSet<String>,
}

impl FlatRemoteInventory {
    pub fn from_keys(prefix: &str, keys: &[String]) -> Self {
        let marker = format!("{prefix}/");
        let mut identities = BTreeSet::new();
        for key in keys {
            let Some(rest) = key.strip_prefix(&marker) else {
                debug!(key = %key, "Ignoring key outside the configured prefix");
                continue;
            };
            if rest.is_empty() || rest.contains('/') {
                debug!(key = %key, "Ignoring key that is not directly under the prefix");
                continue;
            }
            identities.insert(identity_of(rest));
        }
        FlatRemoteInventory { identities }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

/// Performs the single pre-run listing for the flat layout.
pub async fn build_flat_remote_inventory<S>(
    store: &S,
    prefix: &str,
) -> Result<FlatRemoteInventory, SyncError>
where
    S: ObjectStore,
{
    info!(prefix = %prefix, "Listing remote objects (flat layout)");
    let keys = store
        .list_keys(prefix)
        .await
        .map_err(|e| SyncError::RemoteListing {
            prefix: prefix.to_string(),
            source: e,
        })?;
    let inventory = FlatRemoteInventory::from_keys(prefix, &keys);
    info!(
        keys = keys.len(),
        identities = inventory.len(),
        "Built flat remote inventory"
    );
    Ok(inventory)
}

/// Allow-listed files directly under `root`, sorted by file name.
/// Subdirectories are ignored in the flat layout.
pub fn build_flat_local_inventory(
    root: &Path,
    extensions: &[String],
) -> Result<Vec<LocalAsset>, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::AssetsRootMissing {
            path: root.to_path_buf(),
        });
    }
    let assets = scan_asset_files(root, extensions)?;
    info!(
        root = %root.display(),
        assets = assets.len(),
        "Built flat local inventory"
    );
    Ok(assets)
}

/// A single upload planned for the flat layout.
#[derive(Debug, Clone)]
pub struct FlatPlannedUpload {
    pub identity: String,
    pub file_name: String,
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub remote_key: String,
    pub is_new: bool,
}

impl FlatPlannedUpload {
    fn into_record(self, outcome: UploadOutcome) -> FlatUploadRecord {
        FlatUploadRecord {
            identity: self.identity,
            file_name: self.file_name,
            size_bytes: self.size_bytes,
            is_new: self.is_new,
            outcome,
        }
    }
}

/// Per-asset record of a flat run.
#[derive(Debug)]
pub struct FlatUploadRecord {
    pub identity: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub is_new: bool,
    pub outcome: UploadOutcome,
}

/// Plans one upload per local asset in file-name order. Pure.
pub fn plan_flat(
    prefix: &str,
    local: &[LocalAsset],
    remote: &FlatRemoteInventory,
) -> Vec<FlatPlannedUpload> {
    local
        .iter()
        .map(|asset| FlatPlannedUpload {
            identity: asset.identity.clone(),
            file_name: asset.file_name.clone(),
            local_path: asset.path.clone(),
            size_bytes: asset.size_bytes,
            remote_key: format!("{prefix}/{}", asset.file_name),
            is_new: !remote.contains(&asset.identity),
        })
        .collect()
}

/// Flat counterpart of [`crate::synchronise::execute`]: same outcome
/// recording, same cancellation and concurrency handling, records sorted by
/// identity then file name.
pub async fn execute_flat<S>(
    store: &S,
    planned: Vec<FlatPlannedUpload>,
    options: &SyncOptions,
) -> Vec<FlatUploadRecord>
where
    S: ObjectStore,
{
    let concurrency = options.concurrency.max(1);
    let mut records: Vec<FlatUploadRecord> = stream::iter(planned.into_iter().map(|upload| {
        let cancel = options.cancel.clone();
        async move {
            if cancel.is_cancelled() {
                debug!(key = %upload.remote_key, "[SYNC][FLAT] Skipping upload after cancellation");
                return upload.into_record(UploadOutcome::Skipped);
            }
            info!(
                key = %upload.remote_key,
                new = upload.is_new,
                size_bytes = upload.size_bytes,
                "[SYNC][FLAT][UPLOAD] Uploading asset"
            );
            match store.put_public(&upload.local_path, &upload.remote_key).await {
                Ok(stored) => {
                    info!(key = %stored.key, url = %stored.public_url, "[SYNC][FLAT][UPLOAD] Upload succeeded");
                    upload.into_record(UploadOutcome::Uploaded {
                        public_url: stored.public_url,
                    })
                }
                Err(e) => {
                    error!(
                        key = %upload.remote_key,
                        error = ?e,
                        "[SYNC][FLAT][ERROR][UPLOAD] Upload failed, continuing with remaining assets"
                    );
                    upload.into_record(UploadOutcome::Failed { error: e })
                }
            }
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    records.sort_by(|a, b| {
        (a.identity.as_str(), a.file_name.as_str())
            .cmp(&(b.identity.as_str(), b.file_name.as_str()))
    });
    records
}

/// Ordered identity to public URL map for one flat run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatManifest {
    entries: BTreeMap<String, String>,
}

impl FlatManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identity: &str, url: &str) {
        self.entries.insert(identity.to_string(), url.to_string());
    }

    pub fn get(&self, identity: &str) -> Option<&str> {
        self.entries.get(identity).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The flat static-map fragment: no folder comments, no blank lines.
    pub fn to_code_fragment(&self) -> String {
        let mut out = String::from("static const Map<String, String> _imageUrls = {\n");
        for (identity, url) in &self.entries {
            out.push_str(&format!("  '{identity}': '{url}',\n"));
        }
        out.push_str("};\n");
        out
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), SyncError> {
        write_json_artifact(self, path, self.len())
    }
}

/// Output of a flat run.
#[derive(Debug)]
pub struct FlatSyncReport {
    pub manifest: FlatManifest,
    pub records: Vec<FlatUploadRecord>,
    pub remote_count: usize,
    pub local_count: usize,
    pub cancelled: bool,
}

impl FlatSyncReport {
    pub fn uploaded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Uploaded { .. }))
            .count()
    }

    pub fn new_count(&self) -> usize {
        self.new_uploads().count()
    }

    pub fn updated_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !r.is_new && matches!(r.outcome, UploadOutcome::Uploaded { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Skipped))
            .count()
    }

    pub fn attempted_bytes(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| !matches!(r.outcome, UploadOutcome::Skipped))
            .map(|r| r.size_bytes)
            .sum()
    }

    pub fn new_uploads(&self) -> impl Iterator<Item = &FlatUploadRecord> {
        self.records
            .iter()
            .filter(|r| r.is_new && matches!(r.outcome, UploadOutcome::Uploaded { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &FlatUploadRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Failed { .. }))
    }
}

/// Entrypoint: synchronise the flat asset layout according to config.
pub async fn synchronise_flat<S>(
    store: &S,
    config: &SyncConfig,
    options: &SyncOptions,
) -> Result<FlatSyncReport, SyncError>
where
    S: ObjectStore,
{
    info!("[SYNC][FLAT] Starting flat synchronisation run");
    config.trace_loaded();

    // Local scan comes first: configuration errors abort with zero store calls.
    let local = build_flat_local_inventory(&config.assets_dir, &config.extensions)?;
    let local_count = local.len();

    let remote = build_flat_remote_inventory(store, &config.remote_prefix).await?;
    let remote_count = remote.len();

    let planned = plan_flat(&config.remote_prefix, &local, &remote);
    let new_planned = planned.iter().filter(|p| p.is_new).count();
    info!(
        planned = planned.len(),
        new = new_planned,
        updates = planned.len() - new_planned,
        "[SYNC][FLAT] Upload plan ready"
    );

    let records = execute_flat(store, planned, options).await;

    let mut manifest = FlatManifest::new();
    for record in &records {
        if let UploadOutcome::Uploaded { public_url } = &record.outcome {
            manifest.insert(&record.identity, public_url);
        }
    }

    let cancelled = options.cancel.is_cancelled();
    if cancelled {
        warn!("[SYNC][FLAT] Run cancelled, remaining uploads were skipped");
    }

    let report = FlatSyncReport {
        manifest,
        records,
        remote_count,
        local_count,
        cancelled,
    };
    info!(
        uploaded = report.uploaded_count(),
        new = report.new_count(),
        updated = report.updated_count(),
        failed = report.failed_count(),
        skipped = report.skipped_count(),
        "[SYNC][FLAT] Synchronisation run finished"
    );
    Ok(report)
}
