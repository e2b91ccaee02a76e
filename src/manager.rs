//! Storage connection manager.
//!
//! Owns at most one connected backend at a time, tracks its lifecycle
//! status, and exposes the service surface behind read guards so callers
//! never touch a half-connected handle.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::StorageFactory;
use crate::error::{Result, StorageError};
use crate::extended::ExtendedStorageService;
use crate::migrate::{MigrationReport, Migrator};
use crate::service::{BoxedStorageService, StorageService};
use crate::types::{AccountProperties, BackendKind, ByteStream, ObjectMetadata};

/// Connection status of a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStatus {
    /// Not connected to any backend.
    Disconnected,
    /// Currently connecting.
    Connecting,
    /// Connected to a backend.
    Connected,
    /// The last connection attempt failed.
    Failed(String),
}

/// Manager for one active storage connection.
///
/// # Example
///
/// ```ignore
/// use stowage::{AccountProperties, BackendKind, StorageManager, keys};
///
/// let manager = StorageManager::new();
/// let props = AccountProperties::new().with(keys::BASE_FOLDER, "/var/data");
/// manager.connect(BackendKind::LocalFs, props).await?;
///
/// let objects = manager.list_files("", false).await?;
/// ```
pub struct StorageManager {
    connection: Arc<RwLock<Option<BoxedStorageService>>>,
    status: Arc<RwLock<StorageStatus>>,
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StorageManager {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            status: Arc::clone(&self.status),
        }
    }
}

impl StorageManager {
    /// Create a disconnected manager.
    pub fn new() -> Self {
        Self {
            connection: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(StorageStatus::Disconnected)),
        }
    }

    /// Current connection status.
    pub async fn status(&self) -> StorageStatus {
        self.status.read().await.clone()
    }

    /// Whether a backend is connected.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.status.read().await, StorageStatus::Connected)
    }

    /// Backend kind of the active connection.
    pub async fn kind(&self) -> Option<BackendKind> {
        let guard = self.connection.read().await;
        guard.as_ref().map(|c| c.kind())
    }

    /// Connect to a backend, replacing any previous connection.
    pub async fn connect(&self, kind: BackendKind, properties: AccountProperties) -> Result<()> {
        if self.is_connected().await {
            self.disconnect().await?;
        }

        {
            let mut status = self.status.write().await;
            *status = StorageStatus::Connecting;
        }

        let mut connection = StorageFactory::create(kind, properties);
        if let Err(e) = connection.connect().await {
            let mut status = self.status.write().await;
            *status = StorageStatus::Failed(e.to_string());
            return Err(e);
        }

        {
            let mut guard = self.connection.write().await;
            *guard = Some(connection);
        }
        {
            let mut status = self.status.write().await;
            *status = StorageStatus::Connected;
        }
        Ok(())
    }

    /// Disconnect the active backend, if any.
    pub async fn disconnect(&self) -> Result<()> {
        let mut guard = self.connection.write().await;
        if let Some(mut conn) = guard.take() {
            conn.disconnect().await?;
        }
        drop(guard);

        let mut status = self.status.write().await;
        *status = StorageStatus::Disconnected;
        Ok(())
    }

    // Delegated operations

    /// Whether any object exists at `path`.
    pub async fn check_object_exists(&self, path: &str) -> Result<bool> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.check_object_exists(path).await
    }

    /// Whether a file exists at `path`.
    pub async fn check_file_exists(&self, path: &str) -> Result<bool> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.check_file_exists(path).await
    }

    /// Whether a directory exists at `path`.
    pub async fn check_directory_exists(&self, path: &str) -> Result<bool> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.check_directory_exists(path).await
    }

    /// Create an empty directory marker.
    pub async fn create_folder(&self, path: &str) -> Result<()> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.create_folder(path).await
    }

    /// Delete the object at `path`.
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.delete(path, recursive).await
    }

    /// List objects under `path`.
    pub async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<ObjectMetadata>> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.list_files(path, recursive).await
    }

    /// Metadata of the object at `path`.
    pub async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.get_metadata(path).await
    }

    /// Open the content stream of the object at `path`.
    pub async fn get_input_stream(&self, path: &str) -> Result<ByteStream> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.get_input_stream(path).await
    }

    /// A fetchable URL for the object at `path`.
    pub async fn public_url(&self, path: &str) -> Result<String> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.public_url(path).await
    }

    /// Upload a local file or directory tree under `dest`.
    pub async fn upload(&self, local: &Path, dest: &str) -> Result<()> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.upload(local, dest).await
    }

    /// Download the object at `src` into `local_dir`.
    pub async fn download_to_directory(&self, src: &str, local_dir: &Path) -> Result<()> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.download_to_directory(src, local_dir).await
    }

    /// Copy an object within the active backend.
    pub async fn copy_file(&self, src: &str, dest: &str) -> Result<()> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.copy_file(src, dest).await
    }

    /// Move an object within the active backend.
    pub async fn move_file(&self, src: &str, dest: &str) -> Result<()> {
        let guard = self.connection.read().await;
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        conn.move_file(src, dest).await
    }

    /// Replay the subtree at `src` onto the backend managed by `dest`.
    pub async fn migrate_data(
        &self,
        src: &str,
        dest: &StorageManager,
        dest_prefix: &str,
    ) -> Result<MigrationReport> {
        let src_guard = self.connection.read().await;
        let src_conn = src_guard.as_ref().ok_or(StorageError::NotConnected)?;
        let dest_guard = dest.connection.read().await;
        let dest_conn = dest_guard.as_ref().ok_or(StorageError::NotConnected)?;

        Migrator::new()
            .run(src_conn.as_ref(), src, dest_conn.as_ref(), dest_prefix)
            .await
    }
}
