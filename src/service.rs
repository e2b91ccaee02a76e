//! The primitive storage-service contract.
//!
//! [`StorageService`] is the single trait every backend implements. It covers
//! session lifecycle plus the primitive object operations; everything
//! recursive or cross-backend is layered on top in
//! [`ExtendedStorageService`](crate::extended::ExtendedStorageService) and
//! stays backend-agnostic.
//!
//! A handle is stateful: constructed, then `connect`ed, then used, then
//! `disconnect`ed. Operations outside that window fail with
//! [`StorageError::NotConnected`]. One handle is not meant to be shared
//! across threads without external locking; session state is not reentrant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::{Result, StorageError};
use crate::types::{AccountProperties, BackendKind, ByteStream, ObjectMetadata, StorageObject};

/// Primitive operations of one storage backend.
///
/// Paths are normalized slash-delimited keys; see [`crate::key`]. All
/// existence checks return `false` rather than erroring when the object is
/// absent — only genuine backend I/O failures surface as errors.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// The backend kind behind this handle.
    fn kind(&self) -> BackendKind;

    /// The account properties this handle was constructed with.
    fn properties(&self) -> &AccountProperties;

    /// Establish the backend session.
    ///
    /// Idempotent: connecting an already-connected handle is a no-op.
    /// Fails with `Configuration` when required properties are missing,
    /// `Authentication` on rejected credentials, and `Connection` on
    /// network or I/O failure.
    async fn connect(&mut self) -> Result<()>;

    /// Release the backend session. Safe to call when not connected.
    async fn disconnect(&mut self) -> Result<()>;

    /// Whether the handle currently holds a session.
    async fn is_connected(&self) -> bool;

    /// Whether a regular file exists at `path`.
    async fn check_file_exists(&self, path: &str) -> Result<bool>;

    /// Whether a directory exists at `path`.
    ///
    /// On flat namespaces a directory exists when its marker object exists
    /// or any stored key carries it as a prefix.
    async fn check_directory_exists(&self, path: &str) -> Result<bool>;

    /// Whether any object (file or directory) exists at `path`.
    async fn check_object_exists(&self, path: &str) -> Result<bool> {
        Ok(self.check_file_exists(path).await? || self.check_directory_exists(path).await?)
    }

    /// Create an empty directory marker. Idempotent.
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Upload one local file into the directory `dest_dir`, keeping its
    /// name. An existing object at the destination is overwritten without
    /// prompting; collision policy belongs to the caller.
    async fn upload_single_file(&self, local_file: &Path, dest_dir: &str) -> Result<()>;

    /// Write raw bytes at `path`, overwriting any existing object.
    async fn write_object(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Open the content stream of the object at `path`.
    ///
    /// Fails with `NotFound` if the object does not exist. The stream is a
    /// scoped resource; the caller must drop it when done.
    async fn get_input_stream(&self, path: &str) -> Result<ByteStream>;

    /// Fetch the object at `path` with its metadata and open stream.
    async fn get_storage_object(&self, path: &str) -> Result<StorageObject> {
        let metadata = self.get_metadata(path).await?;
        let stream = self.get_input_stream(path).await?;
        Ok(StorageObject { metadata, stream })
    }

    /// Metadata of the object at `path`; `NotFound` if absent.
    async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata>;

    /// Delete the object at `path`.
    ///
    /// With `recursive` unset, deleting a non-empty directory fails with
    /// `DirectoryNotEmpty`; with it set, all descendants go first. Deleting
    /// an absent path is a no-op success.
    async fn delete(&self, path: &str, recursive: bool) -> Result<()>;

    /// List objects under the directory at `path`.
    ///
    /// Non-recursive listings return direct children only. Recursive
    /// listings return every descendant, with parent directories ordered
    /// before their contents.
    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<ObjectMetadata>>;

    /// Size in bytes of the object at `path`; `NotFound` if absent.
    async fn size_of(&self, path: &str) -> Result<u64> {
        Ok(self.get_metadata(path).await?.size)
    }

    /// Last modification time of the object at `path`; `NotFound` if absent.
    async fn last_modified(&self, path: &str) -> Result<DateTime<Utc>> {
        let meta = self.get_metadata(path).await?;
        meta.last_modified
            .ok_or_else(|| StorageError::backend(format!("no modification time recorded for {path}")))
    }

    /// A URL under which the object can be fetched: presigned where the
    /// backend supports signing, otherwise the backend URI.
    async fn public_url(&self, path: &str) -> Result<String>;
}

/// A boxed storage service for dynamic dispatch.
pub type BoxedStorageService = Box<dyn StorageService>;
