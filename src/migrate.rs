//! Cross-backend migration.
//!
//! A migration replays an object subtree from a source backend onto a
//! destination backend, preserving relative structure under a destination
//! prefix. The run is best-effort by design: each descendant transfer
//! stands alone, failures are recorded and skipped, and the aggregate
//! report names every relative path that did not make it. Re-invoking a
//! migration is safe — folder creation and object writes are
//! overwrite-based, so completed descendants are simply rewritten.
//!
//! The source listing is taken once, as a point-in-time snapshot.
//! Mutating the source while a run is in flight is undefined behavior;
//! no consistency guarantee is made for that case.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::extended::transfer_object;
use crate::key;
use crate::service::StorageService;
use crate::types::ObjectKind;

/// Observable phase of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No run started yet.
    Idle,
    /// Snapshotting the source subtree.
    Listing,
    /// Replaying descendants against the destination.
    Transferring {
        /// Descendants already attempted.
        done: usize,
        /// Descendants in the snapshot.
        total: usize,
    },
    /// Finished with every descendant transferred.
    Done,
    /// Finished with at least one failed descendant.
    Failed,
    /// Stopped early by the cancel token.
    Cancelled,
}

/// Cooperative cancellation flag for a migration run.
///
/// Checked between descendant transfers; objects already written to the
/// destination stay intact, since migration is not transactional.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Aggregate outcome of one migration run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Descendants in the source snapshot.
    pub total: usize,
    /// Descendants transferred successfully.
    pub transferred: usize,
    /// Relative paths whose transfer failed.
    pub failed: Vec<String>,
    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,
}

impl MigrationReport {
    /// Whether every descendant arrived.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed.is_empty()
    }

    /// Terminal state matching this report.
    pub fn final_state(&self) -> MigrationState {
        if self.cancelled {
            MigrationState::Cancelled
        } else if self.failed.is_empty() {
            MigrationState::Done
        } else {
            MigrationState::Failed
        }
    }
}

/// Replays an object subtree from one backend onto another.
///
/// Destination keys keep the source base name: migrating `photos` with
/// prefix `backup` produces `backup/photos/…`. There is no automatic
/// retry; callers re-invoke the run when they want one.
pub struct Migrator {
    state: Arc<RwLock<MigrationState>>,
    cancel: CancelToken,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Migrator {
    /// Create a migrator with a fresh cancel token.
    pub fn new() -> Self {
        Self::with_cancel_token(CancelToken::new())
    }

    /// Create a migrator driven by an externally held cancel token.
    pub fn with_cancel_token(cancel: CancelToken) -> Self {
        Self {
            state: Arc::new(RwLock::new(MigrationState::Idle)),
            cancel,
        }
    }

    /// The token cancelling this migrator's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current phase of the run.
    pub async fn state(&self) -> MigrationState {
        *self.state.read().await
    }

    async fn set_state(&self, state: MigrationState) {
        *self.state.write().await = state;
    }

    /// Replay the subtree at `src_path` from `source` onto `dest` under
    /// `dest_prefix`.
    ///
    /// Listing failures abort the run; per-descendant failures do not.
    pub async fn run<S, D>(
        &self,
        source: &S,
        src_path: &str,
        dest: &D,
        dest_prefix: &str,
    ) -> Result<MigrationReport>
    where
        S: StorageService + ?Sized,
        D: StorageService + ?Sized,
    {
        let src_key = key::as_file(src_path);
        let base = key::parent(&src_key).to_string();

        self.set_state(MigrationState::Listing).await;
        let is_dir = source.check_directory_exists(&src_key).await?;
        let objects = if is_dir {
            source.list_files(&src_key, true).await?
        } else {
            vec![source.get_metadata(&src_key).await?]
        };
        let total = objects.len();

        if is_dir {
            // the subtree root lands before any descendant
            dest.create_folder(&key::join(dest_prefix, key::file_name(&src_key)))
                .await?;
        }

        let mut report = MigrationReport {
            total,
            transferred: 0,
            failed: Vec::new(),
            cancelled: false,
        };

        for (done, object) in objects.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(done, total, "migration cancelled");
                report.cancelled = true;
                break;
            }
            self.set_state(MigrationState::Transferring { done, total }).await;

            let relative = key::relative_to(&object.key, &base).to_string();
            let target = key::join(dest_prefix, &relative);
            let outcome = match object.kind {
                ObjectKind::Directory => dest.create_folder(&target).await,
                ObjectKind::File => transfer_object(source, &object.key, dest, &target).await,
            };

            match outcome {
                Ok(()) => {
                    report.transferred += 1;
                    debug!(key = %object.key, %target, "descendant transferred");
                }
                Err(error) => {
                    warn!(%error, key = %object.key, "descendant transfer failed");
                    report.failed.push(relative);
                }
            }
        }

        debug!(
            total,
            transferred = report.transferred,
            failed = report.failed.len(),
            "migration finished"
        );
        self.set_state(report.final_state()).await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extended::ExtendedStorageService;
    use crate::testutil;

    #[tokio::test]
    async fn test_migrate_replays_every_object() {
        let staging = tempfile::tempdir().unwrap();
        let src_root = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();

        testutil::write_local_file(staging.path(), "resources/test.1", b"one");
        testutil::write_local_file(staging.path(), "resources/TEST_FOLDER/test.2", b"two");

        let source = testutil::connected_local(src_root.path()).await;
        let dest = testutil::connected_local(dst_root.path()).await;
        source.upload(&staging.path().join("resources"), "resources").await.unwrap();

        let report = source.migrate_data("resources", &dest, "").await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.transferred, 3);
        assert!(report.is_complete());
        assert_eq!(report.final_state(), MigrationState::Done);

        assert!(dest.check_file_exists("resources/test.1").await.unwrap());
        assert!(dest.check_file_exists("resources/TEST_FOLDER/test.2").await.unwrap());
        let obj = dest.get_storage_object("resources/TEST_FOLDER/test.2").await.unwrap();
        assert_eq!(obj.read_to_end().await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_migrate_under_a_prefix() {
        let staging = tempfile::tempdir().unwrap();
        let src_root = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();

        testutil::write_local_file(staging.path(), "resources/test.1", b"one");
        let source = testutil::connected_local(src_root.path()).await;
        let dest = testutil::connected_local(dst_root.path()).await;
        source.upload(&staging.path().join("resources"), "resources").await.unwrap();

        let report = source.migrate_data("resources", &dest, "backup").await.unwrap();
        assert!(report.is_complete());
        assert!(dest.check_file_exists("backup/resources/test.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_single_file() {
        let staging = tempfile::tempdir().unwrap();
        let src_root = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();

        let local = testutil::write_local_file(staging.path(), "test.1", b"one");
        let source = testutil::connected_local(src_root.path()).await;
        let dest = testutil::connected_local(dst_root.path()).await;
        source.upload_single_file(&local, "data/").await.unwrap();

        let report = source.migrate_data("data/test.1", &dest, "copied").await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.transferred, 1);
        assert!(dest.check_file_exists("copied/test.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_records_failures_and_keeps_going() {
        let staging = tempfile::tempdir().unwrap();
        let src_root = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();

        testutil::write_local_file(staging.path(), "resources/test.1", b"one");
        testutil::write_local_file(staging.path(), "resources/TEST_FOLDER/test.2", b"two");

        let source = testutil::connected_local(src_root.path()).await;
        let dest = testutil::flaky_local(dst_root.path(), "test.2").await;
        source.upload(&staging.path().join("resources"), "resources").await.unwrap();

        let report = source.migrate_data("resources", &dest, "").await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.transferred, 2);
        assert_eq!(report.failed, vec!["resources/TEST_FOLDER/test.2".to_string()]);
        assert!(!report.is_complete());
        assert_eq!(report.final_state(), MigrationState::Failed);

        // the rest of the snapshot still arrived
        assert!(dest.check_file_exists("resources/test.1").await.unwrap());
        assert!(!dest.check_file_exists("resources/TEST_FOLDER/test.2").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_between_transfers() {
        let staging = tempfile::tempdir().unwrap();
        let src_root = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();

        testutil::write_local_file(staging.path(), "resources/test.1", b"one");
        let source = testutil::connected_local(src_root.path()).await;
        let dest = testutil::connected_local(dst_root.path()).await;
        source.upload(&staging.path().join("resources"), "resources").await.unwrap();

        let migrator = Migrator::new();
        migrator.cancel_token().cancel();
        let report = migrator.run(&source, "resources", &dest, "").await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.transferred, 0);
        assert_eq!(report.final_state(), MigrationState::Cancelled);
        assert_eq!(migrator.state().await, MigrationState::Cancelled);
        assert!(!dest.check_file_exists("resources/test.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rerun_after_failure_converges() {
        let staging = tempfile::tempdir().unwrap();
        let src_root = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();

        testutil::write_local_file(staging.path(), "resources/test.1", b"one");
        testutil::write_local_file(staging.path(), "resources/TEST_FOLDER/test.2", b"two");

        let source = testutil::connected_local(src_root.path()).await;
        source.upload(&staging.path().join("resources"), "resources").await.unwrap();

        let flaky = testutil::flaky_local(dst_root.path(), "test.2").await;
        let first = source.migrate_data("resources", &flaky, "").await.unwrap();
        assert_eq!(first.failed.len(), 1);

        // same destination root, now healthy
        let dest = testutil::connected_local(dst_root.path()).await;
        let second = source.migrate_data("resources", &dest, "").await.unwrap();
        assert!(second.is_complete());
        assert!(dest.check_file_exists("resources/TEST_FOLDER/test.2").await.unwrap());
    }
}
