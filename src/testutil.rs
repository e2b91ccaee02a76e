//! Shared test fixtures.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::backend::LocalStorage;
use crate::error::{Result, StorageError};
use crate::service::StorageService;
use crate::types::{keys, AccountProperties, BackendKind, ByteStream, ObjectMetadata};

pub(crate) fn local_properties(root: &Path) -> AccountProperties {
    AccountProperties::new().with(keys::BASE_FOLDER, root.to_str().unwrap())
}

pub(crate) async fn connected_local(root: &Path) -> LocalStorage {
    let mut service = LocalStorage::new(local_properties(root));
    service.connect().await.unwrap();
    service
}

pub(crate) async fn flaky_local(root: &Path, fail_on: &str) -> FlakyStorage {
    FlakyStorage {
        inner: connected_local(root).await,
        fail_on: fail_on.to_string(),
    }
}

/// Write a file (and its parents) under `base`, returning its path.
pub(crate) fn write_local_file(base: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = base.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Local backend that fails `write_object` for keys containing a marker
/// substring, for exercising partial-failure policies.
pub(crate) struct FlakyStorage {
    inner: LocalStorage,
    fail_on: String,
}

#[async_trait]
impl StorageService for FlakyStorage {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn properties(&self) -> &AccountProperties {
        self.inner.properties()
    }

    async fn connect(&mut self) -> Result<()> {
        self.inner.connect().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.inner.disconnect().await
    }

    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    async fn check_file_exists(&self, path: &str) -> Result<bool> {
        self.inner.check_file_exists(path).await
    }

    async fn check_directory_exists(&self, path: &str) -> Result<bool> {
        self.inner.check_directory_exists(path).await
    }

    async fn create_folder(&self, path: &str) -> Result<()> {
        self.inner.create_folder(path).await
    }

    async fn upload_single_file(&self, local_file: &Path, dest_dir: &str) -> Result<()> {
        self.inner.upload_single_file(local_file, dest_dir).await
    }

    async fn write_object(&self, path: &str, data: Vec<u8>) -> Result<()> {
        if path.contains(&self.fail_on) {
            return Err(StorageError::backend(format!("injected failure for {path}")));
        }
        self.inner.write_object(path, data).await
    }

    async fn get_input_stream(&self, path: &str) -> Result<ByteStream> {
        self.inner.get_input_stream(path).await
    }

    async fn get_metadata(&self, path: &str) -> Result<ObjectMetadata> {
        self.inner.get_metadata(path).await
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        self.inner.delete(path, recursive).await
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<ObjectMetadata>> {
        self.inner.list_files(path, recursive).await
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        self.inner.public_url(path).await
    }
}
