//! Backend adapters.
//!
//! Each adapter binds the [`StorageService`](crate::service::StorageService)
//! contract to one concrete store through an opendal operator built at
//! `connect` time. Directory emulation over flat namespaces lives here, in
//! the adapters, never in the composite layer.

mod factory;
mod local;
mod s3;

pub use factory::StorageFactory;
pub use local::LocalStorage;
pub use s3::S3Storage;
