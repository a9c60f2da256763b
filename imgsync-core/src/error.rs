use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::contract::StoreError;

/// Fatal errors of a synchronisation run.
///
/// Per-asset upload failures are deliberately absent here: they are recorded
/// as [`crate::synchronise::UploadOutcome::Failed`] on the run report and the
/// run continues past them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The configured asset root does not exist or is not a directory.
    #[error("assets root {path:?} does not exist or is not a directory")]
    AssetsRootMissing { path: PathBuf },

    /// Reading the local asset tree failed partway through the scan.
    #[error("failed to scan local assets under {path:?}")]
    AssetScan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The single pre-run remote listing failed. Without the remote
    /// inventory, new-versus-updated classification would be guesswork.
    #[error("failed to list remote objects under prefix {prefix:?}")]
    RemoteListing {
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// Persisting the manifest artifact failed after the run.
    #[error("failed to write manifest to {path:?}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    /// True for errors caused by local configuration, raised before any
    /// remote call is made.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::AssetsRootMissing { .. } | SyncError::AssetScan { .. }
        )
    }
}
