//! The manifest of published asset URLs and its emitted artifacts.
//!
//! A [`Manifest`] maps folder to identity to public URL for the successful
//! uploads of one run. Two artifacts are derived from it:
//! - a code fragment for the consuming app's static URL map (plus an optional
//!   per-folder accessor block), meant to be pasted into source, and
//! - a pretty-printed JSON file, overwritten in full each run, that mirrors
//!   the same nested map for other tooling.
//!
//! Both orderings come from the underlying sorted maps, so byte-identical
//! input produces byte-identical output regardless of upload order.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SyncError;

/// Ordered folder to identity to public URL map for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    folders: BTreeMap<String, BTreeMap<String, String>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, folder: &str, identity: &str, url: &str) {
        self.folders
            .entry(folder.to_string())
            .or_default()
            .insert(identity.to_string(), url.to_string());
    }

    pub fn get(&self, folder: &str, identity: &str) -> Option<&str> {
        self.folders
            .get(folder)?
            .get(identity)
            .map(String::as_str)
    }

    /// Total number of (folder, identity) entries.
    pub fn len(&self) -> usize {
        self.folders.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.values().all(BTreeMap::is_empty)
    }

    /// The static URL map fragment for the consuming app: one comment header
    /// per folder, one quoted entry per identity, a blank line after each
    /// folder block.
    pub fn to_code_fragment(&self) -> String {
        let mut out = String::from("static const Map<String, String> _imageUrls = {\n");
        for (folder, entries) in &self.folders {
            out.push_str(&format!("  // {folder}\n"));
            for (identity, url) in entries {
                out.push_str(&format!("  '{identity}': '{url}',\n"));
            }
            out.push('\n');
        }
        out.push_str("};\n");
        out
    }

    /// One accessor method per folder, folder name capitalised.
    pub fn to_helper_fragment(&self) -> String {
        let mut out = String::new();
        for folder in self.folders.keys() {
            let method = format!("get{}ImageUrl", capitalise(folder));
            out.push_str(&format!(
                "static Future<String> {method}(String imageName) async {{\n"
            ));
            out.push_str("  return getImageUrl(imageName);\n");
            out.push_str("}\n\n");
        }
        out
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Writes the JSON artifact, replacing any previous content at `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), SyncError> {
        write_json_artifact(self, path, self.len())
    }
}

pub(crate) fn capitalise(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Serialises `value` as pretty JSON and writes it to `path` in full.
pub(crate) fn write_json_artifact<T: Serialize>(
    value: &T,
    path: &Path,
    entries: usize,
) -> Result<(), SyncError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| SyncError::ManifestWrite {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    std::fs::write(path, json).map_err(|e| SyncError::ManifestWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(path = %path.display(), entries, "Wrote manifest");
    Ok(())
}
