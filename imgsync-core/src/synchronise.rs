//! High-level pipeline: scan → list → plan → upload for the structured layout.
//!
//! This module provides the top-level orchestration logic for "synchronising"
//! a local asset tree into the remote store. It implements a coordinated
//! pipeline that:
//!   - Scans the local asset root into a per-folder inventory (configuration
//!     problems surface here, before any remote call)
//!   - Lists the remote store exactly once and parses the keys into the
//!     pre-run inventory
//!   - Plans one upload per local asset, classifying each as new or updated
//!     against the pre-run inventory (classification is reporting-only; every
//!     asset is uploaded regardless)
//!   - Executes the plan via [`ObjectStore::put_public`], recording per-asset
//!     outcomes without aborting on individual failures
//!   - Folds the outcomes into a [`SyncReport`] with the manifest of public
//!     URLs.
//!
//! # Major Types
//! - [`SyncOptions`]: concurrency bound and cancellation token for a run
//! - [`SyncReport`]: output report with manifest, records and counts
//!
//! # Error Handling
//! Only the scan, the listing and manifest persistence are fatal; a failed
//! upload becomes an [`UploadOutcome::Failed`] record and the run continues.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Supporting steps: [`plan`], [`execute`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::contract::{ObjectStore, StoreError};
use crate::error::SyncError;
use crate::inventory::{
    build_local_inventory, build_remote_inventory, LocalInventory, RemoteInventory,
};
use crate::manifest::Manifest;

/// Tuning knobs for one synchronisation run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Uploads in flight at once. 1 preserves strict sequential order;
    /// higher values fan out over independent assets.
    pub concurrency: usize,
    /// Cooperative cancellation: once triggered, no further uploads are
    /// issued, in-flight uploads finish, the rest is recorded as skipped.
    pub cancel: CancellationToken,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }
}

/// A single upload the planner decided on.
#[derive(Debug, Clone)]
pub struct PlannedUpload {
    pub folder: String,
    pub identity: String,
    pub file_name: String,
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub remote_key: String,
    /// Absent from the pre-run remote inventory.
    pub is_new: bool,
}

impl PlannedUpload {
    fn into_record(self, outcome: UploadOutcome) -> UploadRecord {
        UploadRecord {
            folder: self.folder,
            identity: self.identity,
            file_name: self.file_name,
            size_bytes: self.size_bytes,
            is_new: self.is_new,
            outcome,
        }
    }
}

/// What happened to one planned upload.
#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded { public_url: String },
    Failed { error: StoreError },
    /// Never issued: the run was cancelled before this upload started.
    Skipped,
}

/// Per-asset record in the run report.
#[derive(Debug)]
pub struct UploadRecord {
    pub folder: String,
    pub identity: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub is_new: bool,
    pub outcome: UploadOutcome,
}

/// Plans one upload per local asset, in folder then file-name order.
///
/// Pure: no I/O, no store calls. The remote key keeps the original file name
/// including its extension.
pub fn plan(
    prefix: &str,
    local: &LocalInventory,
    remote: &RemoteInventory,
) -> Vec<PlannedUpload> {
    let mut planned = Vec::new();
    for (folder, assets) in local {
        for asset in assets {
            let is_new = !remote.contains(folder, &asset.identity);
            planned.push(PlannedUpload {
                folder: folder.clone(),
                identity: asset.identity.clone(),
                file_name: asset.file_name.clone(),
                local_path: asset.path.clone(),
                size_bytes: asset.size_bytes,
                remote_key: format!("{prefix}/{folder}/{}", asset.file_name),
                is_new,
            });
        }
    }
    planned
}

/// Executes the plan against the store, at most `options.concurrency` uploads
/// in flight. Per-asset failures are recorded, never propagated. Records come
/// back sorted by (folder, identity, file name) so downstream output is
/// deterministic at any concurrency, including when two files share a stem.
pub async fn execute<S>(
    store: &S,
    planned: Vec<PlannedUpload>,
    options: &SyncOptions,
) -> Vec<UploadRecord>
where
    S: ObjectStore,
{
    let concurrency = options.concurrency.max(1);
    let mut records: Vec<UploadRecord> = stream::iter(planned.into_iter().map(|upload| {
        let cancel = options.cancel.clone();
        async move {
            if cancel.is_cancelled() {
                debug!(key = %upload.remote_key, "[SYNC] Skipping upload after cancellation");
                return upload.into_record(UploadOutcome::Skipped);
            }
            info!(
                key = %upload.remote_key,
                new = upload.is_new,
                size_bytes = upload.size_bytes,
                "[SYNC][UPLOAD] Uploading asset"
            );
            match store.put_public(&upload.local_path, &upload.remote_key).await {
                Ok(stored) => {
                    info!(key = %stored.key, url = %stored.public_url, "[SYNC][UPLOAD] Upload succeeded");
                    upload.into_record(UploadOutcome::Uploaded {
                        public_url: stored.public_url,
                    })
                }
                Err(e) => {
                    error!(
                        key = %upload.remote_key,
                        error = ?e,
                        "[SYNC][ERROR][UPLOAD] Upload failed, continuing with remaining assets"
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
        (a.folder.as_str(), a.identity.as_str(), a.file_name.as_str()).cmp(&(
            b.folder.as_str(),
            b.identity.as_str(),
            b.file_name.as_str(),
        ))
    });
    records
}

/// Entrypoint: synchronise the structured asset tree according to config.
pub async fn synchronise<S>(
    store: &S,
    config: &SyncConfig,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
    S: ObjectStore,
{
    info!("[SYNC] Starting structured synchronisation run");
    config.trace_loaded();

    // Local scan comes first: configuration errors abort with zero store calls.
    let local = build_local_inventory(&config.assets_dir, &config.extensions)?;
    let local_counts: BTreeMap<String, usize> = local
        .iter()
        .map(|(folder, assets)| (folder.clone(), assets.len()))
        .collect();

    let remote = build_remote_inventory(store, &config.remote_prefix).await?;
    let remote_counts = remote.counts();

    let planned = plan(&config.remote_prefix, &local, &remote);
    let new_planned = planned.iter().filter(|p| p.is_new).count();
    info!(
        planned = planned.len(),
        new = new_planned,
        updates = planned.len() - new_planned,
        "[SYNC] Upload plan ready"
    );

    let records = execute(store, planned, options).await;

    // On an identity collision the record sorted last (by file name) wins.
    let mut manifest = Manifest::new();
    for record in &records {
        if let UploadOutcome::Uploaded { public_url } = &record.outcome {
            manifest.insert(&record.folder, &record.identity, public_url);
        }
    }

    let cancelled = options.cancel.is_cancelled();
    if cancelled {
        warn!("[SYNC] Run cancelled, remaining uploads were skipped");
    }

    let report = SyncReport {
        manifest,
        records,
        remote_counts,
        local_counts,
        cancelled,
    };
    info!(
        uploaded = report.uploaded_count(),
        new = report.new_count(),
        updated = report.updated_count(),
        failed = report.failed_count(),
        skipped = report.skipped_count(),
        "[SYNC] Synchronisation run finished"
    );
    Ok(report)
}

/// Output of a structured run: the manifest of successful uploads plus the
/// full per-asset record trail and the pre-run counts on both sides.
#[derive(Debug)]
pub struct SyncReport {
    pub manifest: Manifest,
    pub records: Vec<UploadRecord>,
    /// Pre-run remote identity count per folder.
    pub remote_counts: BTreeMap<String, usize>,
    /// Local asset count per folder, empty folders included.
    pub local_counts: BTreeMap<String, usize>,
    pub cancelled: bool,
}

/// Per-folder roll-up over the union of local and remote folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub folder: String,
    pub local: usize,
    pub remote_before: usize,
    pub uploaded: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn uploaded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Uploaded { .. }))
            .count()
    }

    /// Successfully uploaded assets that were absent from the pre-run remote
    /// inventory. A failed upload of a new asset counts as failed, not new.
    pub fn new_count(&self) -> usize {
        self.new_uploads().count()
    }

    /// Successfully uploaded assets that replaced an existing identity.
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

    /// Bytes of every attempted upload. Failed attempts count; skipped
    /// uploads were never issued and do not.
    pub fn attempted_bytes(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| !matches!(r.outcome, UploadOutcome::Skipped))
            .map(|r| r.size_bytes)
            .sum()
    }

    pub fn local_total(&self) -> usize {
        self.local_counts.values().sum()
    }

    pub fn remote_total(&self) -> usize {
        self.remote_counts.values().sum()
    }

    pub fn new_uploads(&self) -> impl Iterator<Item = &UploadRecord> {
        self.records
            .iter()
            .filter(|r| r.is_new && matches!(r.outcome, UploadOutcome::Uploaded { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::Failed { .. }))
    }

    /// One summary per folder over the union of local and remote folders, so
    /// remote-only folders still show up in reporting.
    pub fn folder_summaries(&self) -> Vec<FolderSummary> {
        let mut folders: Vec<&String> = self
            .local_counts
            .keys()
            .chain(self.remote_counts.keys())
            .collect();
        folders.sort();
        folders.dedup();

        folders
            .into_iter()
            .map(|folder| {
                let (uploaded, failed) =
                    self.records
                        .iter()
                        .filter(|r| &r.folder == folder)
                        .fold((0, 0), |(up, fail), record| match record.outcome {
                            UploadOutcome::Uploaded { .. } => (up + 1, fail),
                            UploadOutcome::Failed { .. } => (up, fail + 1),
                            UploadOutcome::Skipped => (up, fail),
                        });
                FolderSummary {
                    folder: folder.clone(),
                    local: self.local_counts.get(folder).copied().unwrap_or(0),
                    remote_before: self.remote_counts.get(folder).copied().unwrap_or(0),
                    uploaded,
                    failed,
                }
            })
            .collect()
    }
}
