//! Local and remote inventories for the structured asset layout.
//!
//! The structured layout groups assets one folder deep below the asset root
//! (`<root>/<folder>/<file>`) and mirrors that grouping in the store under
//! `<prefix>/<folder>/<file>`. This module builds both sides of that picture:
//! - [`build_local_inventory`] walks the first-level folders of the asset
//!   root and collects the files whose extension is on the allow-list.
//! - [`build_remote_inventory`] performs the one listing call of a run and
//!   parses the returned keys into per-folder identity sets.
//!
//! Identities (file name minus the trailing extension) are scoped per folder;
//! the same identity in two folders is two distinct assets.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::contract::ObjectStore;
use crate::error::SyncError;

/// Logical name of an asset: the file name with only its trailing extension
/// stripped. Inner dots survive (`name.tar.gz` becomes `name.tar`); a name
/// without a dot, or with only a leading dot, is returned unchanged.
pub fn identity_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Compares an extension against the allow-list, ignoring ASCII case and
/// tolerating leading dots in the configured entries.
pub(crate) fn extension_allowed(extension: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .map(|entry| entry.trim_start_matches('.'))
        .any(|entry| entry.eq_ignore_ascii_case(extension))
}

/// One local file selected for synchronisation. The owning folder is the
/// grouping key of [`LocalInventory`], not a field here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub identity: String,
    pub file_name: String,
    pub extension: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Folder name to assets, folders sorted, assets sorted by file name.
/// Empty folders appear with empty vectors.
pub type LocalInventory = BTreeMap<String, Vec<LocalAsset>>;

/// Builds the local inventory from the first-level subdirectories of `root`.
///
/// Files directly under `root` are ignored in the structured layout; so are
/// directories nested deeper than one level. A missing or non-directory root
/// is a configuration error raised before any remote call.
pub fn build_local_inventory(
    root: &Path,
    extensions: &[String],
) -> Result<LocalInventory, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::AssetsRootMissing {
            path: root.to_path_buf(),
        });
    }

    let mut inventory: LocalInventory = BTreeMap::new();
    let entries = fs::read_dir(root).map_err(|e| SyncError::AssetScan {
        path: root.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::AssetScan {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            debug!(path = %path.display(), "Ignoring non-folder entry at asset root");
            continue;
        }
        let folder = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(name = ?raw, "Skipping folder with non-UTF-8 name");
                continue;
            }
        };
        let assets = scan_asset_files(&path, extensions)?;
        debug!(folder = %folder, assets = assets.len(), "Scanned asset folder");
        inventory.insert(folder, assets);
    }

    let total: usize = inventory.values().map(Vec::len).sum();
    info!(
        root = %root.display(),
        folders = inventory.len(),
        assets = total,
        "Built local inventory"
    );
    Ok(inventory)
}

/// Collects the allow-listed plain files directly inside `dir`, sorted by
/// file name. Shared by the structured scan (per folder) and the flat scan
/// (asset root itself).
pub(crate) fn scan_asset_files(
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<LocalAsset>, SyncError> {
    let mut assets = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| SyncError::AssetScan {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::AssetScan {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(name = ?raw, dir = %dir.display(), "Skipping file with non-UTF-8 name");
                continue;
            }
        };
        let extension = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext.to_string(),
            None => continue,
        };
        if !extension_allowed(&extension, extensions) {
            continue;
        }
        let size_bytes = entry
            .metadata()
            .map_err(|e| SyncError::AssetScan {
                path: path.clone(),
                source: e,
            })?
            .len();
        assets.push(LocalAsset {
            identity: identity_of(&file_name),
            file_name,
            extension,
            path,
            size_bytes,
        });
    }
    assets.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(assets)
}

/// Identities already present in the store, grouped by folder, as parsed from
/// the pre-run key listing. Only keys of the exact shape
/// `<prefix>/<folder>/<file>` contribute; flatter or deeper keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInventory {
    folders: BTreeMap<String, BTreeSet<String>>,
}

impl RemoteInventory {
    pub fn from_keys(prefix: &str, keys: &[String]) -> Self {
        let marker = format!("{prefix}/");
        let mut folders: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for key in keys {
            let Some(rest) = key.strip_prefix(&marker) else {
                debug!(key = %key, "Ignoring key outside the configured prefix");
                continue;
            };
            match rest.split('/').collect::<Vec<_>>()[..] {
                [folder, file] if !folder.is_empty() && !file.is_empty() => {
                    folders
                        .entry(folder.to_string())
                        .or_default()
                        .insert(identity_of(file));
                }
                _ => {
                    debug!(key = %key, "Ignoring key without exactly one folder level");
                }
            }
        }
        RemoteInventory { folders }
    }

    /// Whether the given identity already exists in the given folder.
    pub fn contains(&self, folder: &str, identity: &str) -> bool {
        self.folders
            .get(folder)
            .is_some_and(|identities| identities.contains(identity))
    }

    /// Identity count per folder.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.folders
            .iter()
            .map(|(folder, identities)| (folder.clone(), identities.len()))
            .collect()
    }

    /// Total identity count over all folders.
    pub fn total(&self) -> usize {
        self.folders.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Performs the single pre-run listing and parses it into a
/// [`RemoteInventory`]. A listing failure is fatal.
pub async fn build_remote_inventory<S>(
    store: &S,
    prefix: &str,
) -> Result<RemoteInventory, SyncError>
where
    S: ObjectStore,
{
    info!(prefix = %prefix, "Listing remote objects");
    let keys = store
        .list_keys(prefix)
        .await
        .map_err(|e| SyncError::RemoteListing {
            prefix: prefix.to_string(),
            source: e,
        })?;
    let inventory = RemoteInventory::from_keys(prefix, &keys);
    info!(
        keys = keys.len(),
        identities = inventory.total(),
        "Built remote inventory"
    );
    Ok(inventory)
}
