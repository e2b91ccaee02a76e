//! Local filesystem backend.
//!
//! Maps object keys onto files under a configured base folder, through the
//! same operator plumbing as the object-store backends so the composite
//! layer never sees the difference. Directories are real directories here;
//! the trailing-slash marker convention of flat namespaces degenerates to
//! `create_dir`.

use async_trait::async_trait;
use futures::StreamExt;
use opendal::layers::{LoggingLayer, RetryLayer};
use opendal::services::Fs;
use opendal::{EntryMode, Operator};
use std::path::Path;
use tokio::sync::RwLock;

use crate::error::{self, Result, StorageError};
use crate::key;
use crate::service::{BoxedStorageService, StorageService};
use crate::types::{keys, AccountProperties, BackendKind, ByteStream, ObjectKind, ObjectMetadata};

/// Storage service over a local base folder.
///
/// The base folder is taken from the [`keys::BASE_FOLDER`] property at
/// `connect` time and created if absent.
pub struct LocalStorage {
    properties: AccountProperties,
    operator: RwLock<Option<Operator>>,
}

impl LocalStorage {
    /// Create an unconnected local backend.
    pub fn new(properties: AccountProperties) -> Self {
        Self {
            properties,
            operator: RwLock::new(None),
        }
    }

    /// Create a boxed local backend.
    pub fn boxed(properties: AccountProperties) -> BoxedStorageService {
        Box::new(Self::new(properties))
    }

    fn build_operator(&self, root: &str) -> Result<Operator> {
        let builder = Fs::default().root(root);
        let op = Operator::new(builder)
            .map_err(|e| error::from_opendal(root, e))?
            .layer(LoggingLayer::default())
            .layer(RetryLayer::new())
            .finish();
        Ok(op)
    }

    /// Get the operator, returning an error if not connected.
    async fn operator(&self) -> Result<Operator> {
        let guard = self.operator.read().await;
        guard.as_ref().cloned().ok_or(StorageError::NotConnected)
    }

    fn object_uri(&self, path: &str) -> String {
        let path = key::as_file(path);
        match self.properties.base_folder() {
            Some(root) => format!("file://{}/{}", root.trim_end_matches('/'), path),
            None => format!("file:///{path}"),
        }
    }

    fn entry_metadata(&self, path: &str, metadata: &opendal::Metadata) -> ObjectMetadata {
        let is_dir = metadata.mode() == EntryMode::DIR;
        let file_key = key::as_file(path);
        let uri = self.object_uri(&file_key);
        ObjectMetadata::new(
            &file_key,
            if is_dir {
                ObjectKind::Directory
            } else {
                ObjectKind::File
            },
            if is_dir { 0 } else { metadata.content_length() },
            metadata.last_modified(),
            uri,
        )
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalFs
    }

    fn properties(&self) -> &AccountProperties {
        &self.properties
    }

    async fn connect(&mut self) -> Result<()> {
        if self.operator.read().await.is_some() {
            return Ok(());
        }

        let root = self.properties.require(keys::BASE_FOLDER)?.to_string();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::io(root.clone(), e))?;

        let op = self.build_operator(&root)?;
        op.check().await.map_err(|e| match e.kind() {
            opendal::ErrorKind::ConfigInvalid => StorageError::Configuration {
                message: e.to_string(),
            },
            opendal::ErrorKind::PermissionDenied => StorageError::Authentication {
                message: e.to_string(),
            },
            _ => StorageError::connection(format!("cannot access base folder {root}"), e),
        })?;

        let mut guard = self.operator.write().await;
        *guard = Some(op);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut guard = self.operator.write().await;
        *guard = None;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.operator.read().await.is_some()
    }

    async fn check_file_exists(&self, path: &str) -> Result<bool> {
        let op = self.operator().await?;
        let p = key::as_file(path);
        if p.is_empty() {
            return Ok(false);
        }
        match op.stat(&p).await {
            Ok(meta) => Ok(meta.mode() == EntryMode::FILE),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(error::from_opendal(&p, e)),
        }
    }

    async fn check_directory_exists(&self, path: &str) -> Result<bool> {
        let op = self.operator().await?;
        let p = key::as_file(path);
        if p.is_empty() {
            // the base folder itself
            return Ok(true);
        }
        match op.stat(&p).await {
            Ok(meta) => Ok(meta.mode() == EntryMode::DIR),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(error::from_opendal(&p, e)),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        let op = self.operator().await?;
        let dir = key::as_dir(path);
        if dir.is_empty() {
            return Ok(());
        }
        op.create_dir(&dir)
            .await
            .map_err(|e| error::from_opendal(&dir, e))
    }

    async fn upload_single_file(&self, local_file: &Path, dest_dir: &str) -> Result<()> {
        let op = self.operator().await?;
        let name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StorageError::configuration(format!(
                    "local path {} has no usable file name",
                    local_file.display()
                ))
            })?;

        let data = tokio::fs::read(local_file).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(local_file.display().to_string())
            } else {
                StorageError::io(local_file.display().to_string(), e)
            }
        })?;

        let dest = key::join(dest_dir, name);
        op.write(&dest, data)
            .await
            .map_err(|e| error::from_opendal(&dest, e))?;
        Ok(())
    }

    async fn write_object(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let op = self.operator().await?;
        let p = key::as_file(path);
        op.write(&p, data)
            .await
            .map_err(|e| error::from_opendal(&p, e))?;
        Ok(())
    }

    async fn get_input_stream(&self, path: &str) -> Result<ByteStream> {
        let op = self.operator().await?;
        let p = key::as_file(path);

        // surface NotFound at call time, not at first poll
        op.stat(&p).await.map_err(|e| error::from_opendal(&p, e))?;

        let reader = op
            .reader(&p)
            .await
            .map_err(|e| error::from_opendal(&p, e))?;
        let stream_path = p.clone();
        let stream = reader
            .into_bytes_stream(0..u64::MAX)
            .await
            .map_err(|e| error::from_opendal(&p, e))?
            .map(move |result| {
                result.map_err(|e| StorageError::connection(format!("read failed for {stream_path}"), e))
            });

        Ok(Box::pin(stream))
    }

    async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata> {
        let op = self.operator().await?;
        let p = key::as_file(path);
        let metadata = op.stat(&p).await.map_err(|e| error::from_opendal(&p, e))?;
        Ok(self.entry_metadata(&p, &metadata))
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let op = self.operator().await?;
        let file_key = key::as_file(path);
        if file_key.is_empty() {
            return Err(StorageError::backend("refusing to delete the backend root"));
        }

        match op.stat(&file_key).await {
            Ok(meta) if meta.mode() == EntryMode::FILE => {
                return op
                    .delete(&file_key)
                    .await
                    .map_err(|e| error::from_opendal(&file_key, e));
            }
            Ok(_) => {}
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => {
                // absent path: idempotent no-op
                return Ok(());
            }
            Err(e) => return Err(error::from_opendal(&file_key, e)),
        }

        let dir_key = key::as_dir(path);
        if recursive {
            return op
                .remove_all(&dir_key)
                .await
                .map_err(|e| error::from_opendal(&dir_key, e));
        }

        let children = self.list_files(&file_key, false).await?;
        if !children.is_empty() {
            return Err(StorageError::DirectoryNotEmpty { path: file_key });
        }
        op.delete(&dir_key)
            .await
            .map_err(|e| error::from_opendal(&dir_key, e))
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<ObjectMetadata>> {
        let op = self.operator().await?;
        let dir = key::as_dir(path);

        let mut lister = op
            .lister_with(&dir)
            .recursive(recursive)
            .await
            .map_err(|e| error::from_opendal(&dir, e))?;

        let mut objects = Vec::new();
        while let Some(entry) = lister.next().await {
            let entry = entry.map_err(|e| error::from_opendal(&dir, e))?;
            let entry_path = entry.path().to_string();
            let norm = key::as_file(&entry_path);

            // skip the listed directory itself
            if norm.is_empty() || norm == key::as_file(&dir) {
                continue;
            }

            objects.push(self.entry_metadata(&entry_path, entry.metadata()));
        }

        if recursive {
            // parents sort before their contents
            objects.sort_by(|a, b| a.key.cmp(&b.key));
        } else {
            objects.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            });
        }

        Ok(objects)
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        // no signing on local disk; hand back the file URI
        let op = self.operator().await?;
        let p = key::as_file(path);
        op.stat(&p).await.map_err(|e| error::from_opendal(&p, e))?;
        Ok(self.object_uri(&p))
    }
}
