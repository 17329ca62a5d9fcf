//! Analysis Storage Library
//!
//! Read-side access to the object store that receives uploads, plus management of the
//! local scratch directory files are downloaded into.
//!
//! [`ObjectStore`] is the backend seam (S3 or a local directory tree); [`ObjectStoreClient`]
//! layers download verification, cleanup and scratch statistics on top of it.
//!
//! # Keys
//!
//! Keys arrive URL-encoded in bucket notifications. [`keys::decode_key`] turns them back
//! into the literal object key before anything else sees them. The local filename of a
//! download is the key's final segment.

pub mod client;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod scratch;
pub mod traits;

// Re-export commonly used types
pub use client::ObjectStoreClient;
#[cfg(feature = "storage-local")]
pub use local::LocalObjectStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3ObjectStore;
pub use traits::{ObjectStore, StorageError, StorageResult};
