//! Storage value types and account configuration.
//!
//! This module defines the backend selector, the account property bag
//! consumed at construction time, and the metadata/content types returned
//! by storage operations.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, StorageError};
use crate::key;

/// Property keys recognized by the bundled backends.
///
/// Unrecognized keys in an [`AccountProperties`] bag are ignored; missing
/// required keys surface as a configuration error at `connect` time.
pub mod keys {
    /// Root directory of a local-filesystem backend.
    pub const BASE_FOLDER: &str = "base_folder";
    /// Bucket or container identifier of an object-store backend.
    pub const BUCKET: &str = "bucket";
    /// Object-store region.
    pub const REGION: &str = "region";
    /// Custom endpoint URL for S3-compatible services.
    pub const ENDPOINT: &str = "endpoint";
    /// Access key identifier.
    pub const ACCESS_KEY_ID: &str = "access_key_id";
    /// Secret access key.
    pub const SECRET_ACCESS_KEY: &str = "secret_access_key";
    /// Set to `"true"` to allow unsigned requests against public buckets.
    pub const ANONYMOUS: &str = "anonymous";
}

/// Supported storage backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local filesystem rooted at a base folder.
    LocalFs,
    /// Amazon S3 and S3-compatible services (MinIO, R2, DigitalOcean Spaces).
    S3,
}

impl BackendKind {
    /// Get the display name for this backend kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::LocalFs => "Local Filesystem",
            BackendKind::S3 => "Amazon S3",
        }
    }

    /// Get all available backend kinds.
    pub fn all() -> Vec<BackendKind> {
        vec![BackendKind::LocalFs, BackendKind::S3]
    }

    /// Check if this backend kind requires credentials.
    pub fn requires_credentials(&self) -> bool {
        match self {
            BackendKind::LocalFs => false,
            BackendKind::S3 => true,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Account configuration consumed when a backend is constructed.
///
/// A flat string key/value bag; see [`keys`] for the recognized entries.
/// The bag is read-only once the backend has connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProperties {
    #[serde(flatten)]
    values: HashMap<String, String>,
}

impl AccountProperties {
    /// Create an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a property.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a property that the backend cannot run without.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| StorageError::configuration(format!("missing required property '{key}'")))
    }

    /// Root directory for a local backend.
    pub fn base_folder(&self) -> Option<&str> {
        self.get(keys::BASE_FOLDER)
    }

    /// Bucket or container identifier.
    pub fn bucket(&self) -> Option<&str> {
        self.get(keys::BUCKET)
    }

    /// Object-store region, if configured.
    pub fn region(&self) -> Option<&str> {
        self.get(keys::REGION)
    }

    /// Custom endpoint, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        self.get(keys::ENDPOINT)
    }

    /// Access key identifier, if configured.
    pub fn access_key_id(&self) -> Option<&str> {
        self.get(keys::ACCESS_KEY_ID)
    }

    /// Secret access key, if configured.
    pub fn secret_access_key(&self) -> Option<&str> {
        self.get(keys::SECRET_ACCESS_KEY)
    }

    /// Whether unsigned requests were requested.
    pub fn anonymous(&self) -> bool {
        self.get(keys::ANONYMOUS)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Whether a stored object is a file or a directory marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A regular object with content.
    File,
    /// A directory, real or emulated via a trailing-slash marker.
    Directory,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::File => write!(f, "file"),
            ObjectKind::Directory => write!(f, "directory"),
        }
    }
}

/// Metadata describing one stored object.
///
/// `key` is the full normalized key without a trailing slash; `parent` and
/// `name` are derived from it, so `key == join(parent, name)` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object name (last path segment).
    pub name: String,
    /// Parent prefix, empty for top-level objects.
    pub parent: String,
    /// Full key.
    pub key: String,
    /// Size in bytes, 0 for directories.
    pub size: u64,
    /// Last modification timestamp, when the backend records one.
    pub last_modified: Option<DateTime<Utc>>,
    /// File or directory.
    pub kind: ObjectKind,
    /// Backend-specific locator (`file://…`, `s3://bucket/…`).
    pub uri: String,
}

impl ObjectMetadata {
    /// Build metadata from a key, deriving `name` and `parent`.
    pub fn new(
        path: &str,
        kind: ObjectKind,
        size: u64,
        last_modified: Option<DateTime<Utc>>,
        uri: String,
    ) -> Self {
        let full = key::as_file(path);
        Self {
            name: key::file_name(&full).to_string(),
            parent: key::parent(&full).to_string(),
            key: full,
            size,
            last_modified,
            kind,
            uri,
        }
    }

    /// Whether this object is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == ObjectKind::Directory
    }
}

/// Content stream of a stored object.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A stored object: metadata plus its open content stream.
///
/// The stream is a scoped resource owned by the caller; dropping the object
/// releases it on every exit path.
pub struct StorageObject {
    /// The object's metadata.
    pub metadata: ObjectMetadata,
    /// The open content stream.
    pub stream: ByteStream,
}

impl StorageObject {
    /// Drain the content stream into memory.
    pub async fn read_to_end(self) -> Result<Vec<u8>> {
        read_stream_to_end(self.stream).await
    }
}

impl std::fmt::Debug for StorageObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageObject")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Collect a content stream into a byte vector.
pub async fn read_stream_to_end(mut stream: ByteStream) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data)
}
