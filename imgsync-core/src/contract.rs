//! # contract: universal interface for object-store uploads
//!
//! This module defines a single trait ([`ObjectStore`]) and its supporting
//! types for publishing local files as publicly readable objects in a remote
//! store, and for listing the objects already present there.
//!
//! ## Interface & Extensibility
//! - Implement the [`ObjectStore`] trait to create new store clients (cloud
//!   bucket API, local fixture, test mock).
//! - All methods are async, returning results and using boxed error types.
//! - Error handling is uniform: all transport/API errors return boxed trait
//!   objects; callers never need to know the concrete client error type.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.
//!
//! ## Adding New Store Backends
//! - Implement the trait for your backend.
//! - `put_public` must leave the object publicly readable and return a stable
//!   public URL for it.
//! - Convert all meaningful upstream errors to a boxed error; do not panic.

use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error type for store operations (simple boxed error, uniform across
/// implementations).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Describes a successfully stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// The full object key the file was stored under.
    pub key: String,
    /// Stable, publicly readable URL for the stored object.
    pub public_url: String,
}

/// Trait for listing and publishing objects in a remote store.
/// The implementor is responsible for connecting to a backing service.
///
/// Retry and timeout policy belongs to the implementation (or a wrapper
/// around it), not to callers of this trait.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all object keys under the given prefix.
    ///
    /// Implementations must return every matching key, following whatever
    /// pagination the backing API imposes.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Upload the file at `local_path` under `key`, make it publicly
    /// readable, and return the stored object with its public URL.
    async fn put_public(&self, local_path: &Path, key: &str)
        -> Result<StoredObject, StoreError>;
}
