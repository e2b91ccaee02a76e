//! Backend selection.
//!
//! Adapters are chosen at configuration time from a [`BackendKind`] plus an
//! account property bag; the rest of the crate only ever sees the
//! [`StorageService`](crate::service::StorageService) contract.

use crate::service::BoxedStorageService;
use crate::types::{AccountProperties, BackendKind};

use super::local::LocalStorage;
use super::s3::S3Storage;

/// Factory for creating storage services from configuration.
///
/// # Example
///
/// ```ignore
/// use stowage::{AccountProperties, BackendKind, StorageFactory, keys};
///
/// let props = AccountProperties::new().with(keys::BASE_FOLDER, "/var/data");
/// let mut service = StorageFactory::create(BackendKind::LocalFs, props);
/// service.connect().await?;
/// ```
pub struct StorageFactory;

impl StorageFactory {
    /// Create an unconnected service of the given kind.
    ///
    /// Property validation is deferred to `connect`, where missing required
    /// keys surface as configuration errors.
    pub fn create(kind: BackendKind, properties: AccountProperties) -> BoxedStorageService {
        match kind {
            BackendKind::LocalFs => LocalStorage::boxed(properties),
            BackendKind::S3 => S3Storage::boxed(properties),
        }
    }

    /// Check if a backend kind has an adapter.
    pub fn is_supported(kind: BackendKind) -> bool {
        match kind {
            BackendKind::LocalFs | BackendKind::S3 => true,
        }
    }

    /// All backend kinds with an adapter.
    pub fn supported_kinds() -> Vec<BackendKind> {
        BackendKind::all()
            .into_iter()
            .filter(|k| Self::is_supported(*k))
            .collect()
    }
}
