#![doc = "Storage integration for CLI and core: bridges the ObjectStore trait to the bucket's JSON API, facilitating public uploads of image assets."]
//
//! # Bucket Client (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the object
//! store abstraction in [`imgsync-core::contract`]. It wires up the
//! `ObjectStore` trait for real use against the bucket's HTTP API, and
//! provides the [`BucketClient`] used by the CLI for networked listings and
//! uploads.
//!
//! - Construct [`BucketClient`] from environment variables (`STORAGE_BUCKET`,
//!   `STORAGE_TOKEN`, optional `STORAGE_API_BASE` for test servers).
//! - Objects are uploaded with a public-read ACL; the public URL of every
//!   stored object is `{base}/{bucket}/{key}` with the key percent-encoded.
//! - All transport, serialization, and error handling are encapsulated in the
//!   client implementation.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use imgsync_core::contract::{ObjectStore, StoreError, StoredObject};

const DEFAULT_API_BASE: &str = "https://storage.googleapis.com";

/// Bytes left verbatim when a key is embedded in a public URL. `/` stays so
/// folder keys keep their path shape.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("failed to read {path:?} for upload")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("environment variable {name} is not set")]
    MissingEnv { name: &'static str },
}

#[derive(Clone)]
pub struct BucketClient {
    http: Client,
    base_url: Url,
    bucket: String,
    token: String,
}

impl BucketClient {
    pub fn new(bucket: impl Into<String>, token: impl Into<String>) -> Result<Self, BucketError> {
        Self::with_base_url(DEFAULT_API_BASE, bucket, token)
    }

    pub fn with_base_url(
        base_url: &str,
        bucket: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, BucketError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            bucket: bucket.into(),
            token: token.into(),
        })
    }

    /// Reads the target bucket and credentials from `STORAGE_BUCKET` and
    /// `STORAGE_TOKEN`. `STORAGE_API_BASE` overrides the API host when set.
    pub fn from_env() -> Result<Self, BucketError> {
        let bucket = env::var("STORAGE_BUCKET").map_err(|e| {
            tracing::error!(error = ?e, "STORAGE_BUCKET missing in environment");
            BucketError::MissingEnv {
                name: "STORAGE_BUCKET",
            }
        })?;
        Self::from_env_for_bucket(bucket)
    }

    /// Same as [`from_env`](Self::from_env), but the bucket name comes from
    /// configuration rather than the environment.
    pub fn from_env_for_bucket(bucket: impl Into<String>) -> Result<Self, BucketError> {
        let token = env::var("STORAGE_TOKEN").map_err(|e| {
            tracing::error!(error = ?e, "STORAGE_TOKEN missing in environment");
            BucketError::MissingEnv {
                name: "STORAGE_TOKEN",
            }
        })?;
        let base = env::var("STORAGE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let client = Self::with_base_url(&base, bucket, token)?;
        tracing::info!(
            bucket = %client.bucket,
            api_base = %client.base_url,
            "Initialised BucketClient from environment"
        );
        Ok(client)
    }

    /// Lists every object key under `prefix`, following pagination until the
    /// listing is exhausted.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, BucketError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.endpoint(&format!("/storage/v1/b/{}/o", self.bucket))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                query.append_pair("fields", "items(name),nextPageToken");
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }
            let response = self.http.get(url).bearer_auth(&self.token).send().await?;
            let page: ListPage = Self::handle_response(response).await?;
            keys.extend(page.items.into_iter().map(|object| object.name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::info!(prefix = %prefix, keys = keys.len(), "Listed bucket objects");
        Ok(keys)
    }

    /// Uploads a local file under `key` with a public-read ACL and returns the
    /// stored object together with its public URL.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        key: &str,
    ) -> Result<StoredObject, BucketError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| BucketError::ReadFile {
                path: local_path.to_path_buf(),
                source,
            })?;
        let mut url = self.endpoint(&format!("/upload/storage/v1/b/{}/o", self.bucket))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uploadType", "media");
            query.append_pair("name", key);
            query.append_pair("predefinedAcl", "publicRead");
        }
        tracing::info!(
            key = %key,
            size_bytes = bytes.len(),
            "Uploading object to bucket"
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(local_path))
            .body(bytes)
            .send()
            .await?;
        let stored: ObjectEntry = Self::handle_response(response).await?;
        tracing::info!(key = %stored.name, "Upload complete");
        let public_url = self.public_url(&stored.name);
        Ok(StoredObject {
            key: stored.name,
            public_url,
        })
    }

    /// Public download URL for a stored key.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.bucket,
            utf8_percent_encode(key, KEY_ENCODE_SET)
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, BucketError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BucketError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BucketError::Api { status, body })
        }
    }
}

#[async_trait]
impl ObjectStore for BucketClient {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.list_objects(prefix).await.map_err(Into::into)
    }

    async fn put_public(&self, local_path: &Path, key: &str) -> Result<StoredObject, StoreError> {
        self.upload_file(local_path, key).await.map_err(Into::into)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
