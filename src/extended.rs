//! Composite storage operations.
//!
//! Everything here is built purely from the primitives of
//! [`StorageService`], so the whole surface works unchanged against any
//! backend — and is available on `dyn StorageService` through a blanket
//! implementation. Recursive walks use explicit worklists instead of
//! recursion.
//!
//! Failure policy differs per operation: `copy_file` visits every
//! descendant and aggregates failures into
//! [`StorageError::PartialFailure`]; `move_file` runs its delete phase only
//! after a fully clean copy, so a failed move never loses source data;
//! `migrate_data` is best-effort and reports per-descendant failures
//! without aborting.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::key;
use crate::migrate::{MigrationReport, Migrator};
use crate::service::StorageService;
use crate::types::{read_stream_to_end, ObjectKind};

fn io_err(path: &Path, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(path.display().to_string())
    } else {
        StorageError::io(path.display().to_string(), e)
    }
}

/// Stream one object from a source backend into a destination backend.
pub(crate) async fn transfer_object<S, D>(
    source: &S,
    src_key: &str,
    dest: &D,
    dest_key: &str,
) -> Result<()>
where
    S: StorageService + ?Sized,
    D: StorageService + ?Sized,
{
    let stream = source.get_input_stream(src_key).await?;
    let data = read_stream_to_end(stream).await?;
    dest.write_object(dest_key, data).await
}

/// Recursive and cross-backend operations composed from primitives.
#[async_trait]
pub trait ExtendedStorageService: StorageService {
    /// Upload a local file or directory tree under `dest`.
    async fn upload(&self, local: &Path, dest: &str) -> Result<()> {
        let meta = tokio::fs::metadata(local)
            .await
            .map_err(|e| io_err(local, e))?;
        if meta.is_dir() {
            self.upload_directory(local, dest).await
        } else {
            self.upload_single_file(local, dest).await
        }
    }

    /// Upload a local directory tree, preserving relative structure:
    /// a file at `local_dir/sub/f` lands at `dest/sub/f`.
    async fn upload_directory(&self, local_dir: &Path, dest: &str) -> Result<()> {
        let dest_root = key::as_file(dest);
        if !dest_root.is_empty() {
            self.create_folder(&dest_root).await?;
        }

        let mut pending: VecDeque<(PathBuf, String)> = VecDeque::new();
        pending.push_back((local_dir.to_path_buf(), dest_root));

        while let Some((dir, prefix)) = pending.pop_front() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io_err(&dir, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };

                if file_type.is_dir() {
                    let child = key::join(&prefix, name);
                    // parent markers land before any of their contents
                    self.create_folder(&child).await?;
                    pending.push_back((path.clone(), child));
                } else if file_type.is_file() {
                    self.upload_single_file(&path, &prefix).await?;
                }
            }
        }

        debug!(local = %local_dir.display(), "directory uploaded");
        Ok(())
    }

    /// Download the object at `src` into `local_dir`, dispatching on
    /// whether it resolves to a directory.
    async fn download_to_directory(&self, src: &str, local_dir: &Path) -> Result<()> {
        if self.check_directory_exists(src).await? {
            self.download_directory_to_directory(src, local_dir).await
        } else {
            self.download_file_to_directory(src, local_dir).await
        }
    }

    /// Download one file into `local_dir`, keeping its name.
    async fn download_file_to_directory(&self, src: &str, local_dir: &Path) -> Result<()> {
        let src_key = key::as_file(src);
        let stream = self.get_input_stream(&src_key).await?;
        let data = read_stream_to_end(stream).await?;

        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|e| io_err(local_dir, e))?;
        let target = local_dir.join(key::file_name(&src_key));
        tokio::fs::write(&target, data)
            .await
            .map_err(|e| io_err(&target, e))
    }

    /// Download a directory tree into `local_dir`, mirroring it under
    /// `local_dir/<base name of src>/…`.
    async fn download_directory_to_directory(&self, src: &str, local_dir: &Path) -> Result<()> {
        let src_key = key::as_file(src);
        if !self.check_directory_exists(&src_key).await? {
            return Err(StorageError::not_found(src_key));
        }

        let base = key::parent(&src_key).to_string();
        let root = local_dir.join(key::file_name(&src_key));
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| io_err(&root, e))?;

        for object in self.list_files(&src_key, true).await? {
            let target = local_dir.join(key::relative_to(&object.key, &base));
            match object.kind {
                ObjectKind::Directory => {
                    tokio::fs::create_dir_all(&target)
                        .await
                        .map_err(|e| io_err(&target, e))?;
                }
                ObjectKind::File => {
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .map_err(|e| io_err(parent, e))?;
                    }
                    let stream = self.get_input_stream(&object.key).await?;
                    let data = read_stream_to_end(stream).await?;
                    tokio::fs::write(&target, data)
                        .await
                        .map_err(|e| io_err(&target, e))?;
                }
            }
        }
        Ok(())
    }

    /// Copy an object within this backend, non-destructively.
    ///
    /// A directory source copies every descendant with the `src` prefix
    /// rebased to `dest`; existing destination objects are overwritten.
    /// Descendant failures are aggregated into `PartialFailure` after the
    /// whole walk.
    async fn copy_file(&self, src: &str, dest: &str) -> Result<()> {
        let src_key = key::as_file(src);
        let dest_key = key::as_file(dest);

        if self.check_directory_exists(&src_key).await? {
            if !dest_key.is_empty() {
                self.create_folder(&dest_key).await?;
            }

            let mut failed_paths = Vec::new();
            for object in self.list_files(&src_key, true).await? {
                let target = key::rebase(&object.key, &src_key, &dest_key);
                let outcome = match object.kind {
                    ObjectKind::Directory => self.create_folder(&target).await,
                    ObjectKind::File => transfer_object(self, &object.key, self, &target).await,
                };
                if let Err(error) = outcome {
                    warn!(%error, key = %object.key, "descendant copy failed");
                    failed_paths.push(object.key);
                }
            }

            if failed_paths.is_empty() {
                Ok(())
            } else {
                Err(StorageError::PartialFailure { failed_paths })
            }
        } else if self.check_file_exists(&src_key).await? {
            transfer_object(self, &src_key, self, &dest_key).await
        } else {
            Err(StorageError::not_found(src_key))
        }
    }

    /// Move an object within this backend: copy, then delete the source.
    ///
    /// The delete phase only runs once every descendant copied cleanly; on
    /// any copy failure the source is left untouched and the aggregate
    /// error surfaces (the destination may be partially populated).
    async fn move_file(&self, src: &str, dest: &str) -> Result<()> {
        self.copy_file(src, dest).await?;
        self.delete(&key::as_file(src), true).await
    }

    /// Replay the subtree at `src` onto another backend under
    /// `dest_prefix`, best-effort. See [`Migrator`] for the policy.
    async fn migrate_data(
        &self,
        src: &str,
        dest: &dyn StorageService,
        dest_prefix: &str,
    ) -> Result<MigrationReport> {
        Migrator::new().run(self, src, dest, dest_prefix).await
    }
}

#[async_trait]
impl<T: StorageService + ?Sized> ExtendedStorageService for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::StorageService;
    use crate::testutil;

    /// The shared fixture: `<staging>/resources/test.1` and
    /// `<staging>/resources/TEST_FOLDER/test.2`.
    fn seed_fixture(staging: &Path) -> PathBuf {
        testutil::write_local_file(staging, "resources/test.1", b"one");
        testutil::write_local_file(staging, "resources/TEST_FOLDER/test.2", b"two");
        staging.join("resources")
    }

    #[tokio::test]
    async fn test_upload_dispatches_on_single_file() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = testutil::write_local_file(staging.path(), "resources/TEST_FOLDER/test.2", b"two");

        assert!(!storage.check_file_exists("resources1/TEST_FOLDER_2/test.2").await.unwrap());
        storage.upload(&local, "resources1/TEST_FOLDER_2/").await.unwrap();
        assert!(storage.check_file_exists("resources1/TEST_FOLDER_2/test.2").await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_directory_preserves_structure() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = seed_fixture(staging.path());

        assert!(!storage.check_directory_exists("resources").await.unwrap());
        storage.upload(&local, "resources").await.unwrap();

        assert!(storage.check_directory_exists("resources").await.unwrap());
        assert!(storage.check_file_exists("resources/test.1").await.unwrap());
        assert!(storage.check_file_exists("resources/TEST_FOLDER/test.2").await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_missing_local_path() {
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let err = storage
            .upload(Path::new("/definitely/not/here"), "resources")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_round_trip_reproduces_relative_set_and_content() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let download = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = seed_fixture(staging.path());

        storage.upload(&local, "resources").await.unwrap();
        storage
            .download_directory_to_directory("resources", download.path())
            .await
            .unwrap();

        let one = download.path().join("resources/test.1");
        let two = download.path().join("resources/TEST_FOLDER/test.2");
        assert_eq!(std::fs::read(&one).unwrap(), b"one");
        assert_eq!(std::fs::read(&two).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_download_file_to_directory() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let download = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = testutil::write_local_file(staging.path(), "resources/TEST_FOLDER/test.2", b"two");
        storage
            .upload_single_file(&local, "resources/TEST_FOLDER/")
            .await
            .unwrap();

        let target_dir = download.path().join("Downloaded_2");
        storage
            .download_file_to_directory("resources/TEST_FOLDER/test.2", &target_dir)
            .await
            .unwrap();
        assert_eq!(std::fs::read(target_dir.join("test.2")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_download_to_directory_dispatches_both_ways() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let download = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = seed_fixture(staging.path());
        storage.upload(&local, "resources").await.unwrap();

        storage
            .download_to_directory("resources", &download.path().join("Downloaded_1"))
            .await
            .unwrap();
        assert!(download.path().join("Downloaded_1/resources/test.1").exists());
        assert!(download
            .path()
            .join("Downloaded_1/resources/TEST_FOLDER/test.2")
            .exists());

        storage
            .download_to_directory("resources/TEST_FOLDER/test.2", &download.path().join("Downloaded_2"))
            .await
            .unwrap();
        assert!(download.path().join("Downloaded_2/test.2").exists());
    }

    #[tokio::test]
    async fn test_copy_file_is_non_destructive() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = seed_fixture(staging.path());
        storage.upload(&local, "resources").await.unwrap();

        storage.copy_file("resources", "resources1").await.unwrap();

        // destination carries the rebased tree
        assert!(storage.check_file_exists("resources1/test.1").await.unwrap());
        assert!(storage.check_file_exists("resources1/TEST_FOLDER/test.2").await.unwrap());

        // source untouched and byte-identical
        let src_obj = storage.get_storage_object("resources/TEST_FOLDER/test.2").await.unwrap();
        let dst_obj = storage.get_storage_object("resources1/TEST_FOLDER/test.2").await.unwrap();
        assert_eq!(
            src_obj.read_to_end().await.unwrap(),
            dst_obj.read_to_end().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_copy_single_file_overwrites_destination() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let one = testutil::write_local_file(staging.path(), "test.1", b"one");
        let other = testutil::write_local_file(staging.path(), "test.2", b"other");
        storage.upload_single_file(&one, "data/").await.unwrap();
        storage.upload_single_file(&other, "data/").await.unwrap();

        storage.copy_file("data/test.1", "data/test.2").await.unwrap();
        let obj = storage.get_storage_object("data/test.2").await.unwrap();
        assert_eq!(obj.read_to_end().await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let err = storage.copy_file("missing", "dest").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_move_file_relocates_the_tree() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let storage = testutil::connected_local(root.path()).await;
        let local = seed_fixture(staging.path());
        storage.upload(&local, "resources").await.unwrap();

        storage.move_file("resources", "resources1").await.unwrap();

        assert!(!storage.check_object_exists("resources/test.1").await.unwrap());
        assert!(!storage.check_object_exists("resources").await.unwrap());
        assert!(storage.check_object_exists("resources1").await.unwrap());
        assert!(storage.check_file_exists("resources1/test.1").await.unwrap());
        assert!(storage.check_file_exists("resources1/TEST_FOLDER/test.2").await.unwrap());
    }

    #[tokio::test]
    async fn test_move_keeps_source_when_a_copy_fails() {
        let staging = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let local = seed_fixture(staging.path());

        // fail every write into the destination subtree
        let storage = testutil::flaky_local(root.path(), "resources1/TEST_FOLDER/").await;
        storage.upload(&local, "resources").await.unwrap();

        let err = storage.move_file("resources", "resources1").await.unwrap_err();
        let StorageError::PartialFailure { failed_paths } = err else {
            panic!("expected PartialFailure");
        };
        assert_eq!(failed_paths, vec!["resources/TEST_FOLDER/test.2".to_string()]);

        // nothing was deleted
        assert!(storage.check_file_exists("resources/test.1").await.unwrap());
        assert!(storage.check_file_exists("resources/TEST_FOLDER/test.2").await.unwrap());
    }
}
