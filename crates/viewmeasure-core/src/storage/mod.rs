//! Storage abstraction for persisted measurement rows.
//!
//! Backends store opaque JSON rows keyed by [`RecordKey`]; the
//! [`MeasurementStore`](crate::gateway::MeasurementStore) gateway decides
//! what a row means.

mod memory;
mod queue;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod indexeddb;

pub use memory::MemoryStorage;
pub use queue::{WriteOp, WriteQueue, WriteStats};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(target_arch = "wasm32")]
pub use indexeddb::IndexedDbStorage;

use crate::geometry::MeasurementId;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage quota exceeded")]
    QuotaExceeded,
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A raw persisted row.
pub type Row = Value;

/// Primary key of a measurement row.
///
/// Ids are only unique inside one image, so the image is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub image: String,
    pub id: MeasurementId,
}

impl RecordKey {
    pub fn new(image: impl Into<String>, id: MeasurementId) -> Self {
        Self {
            image: image.into(),
            id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.image, self.id)
    }
}

/// Trait for durable row stores.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait Storage: Send + Sync {
    /// Insert or replace a row.
    fn put(&self, key: &RecordKey, row: &Row) -> BoxFuture<'_, StorageResult<()>>;

    /// All rows stored for an image, in no particular order.
    fn rows_for_image(&self, image: &str) -> BoxFuture<'_, StorageResult<Vec<Row>>>;

    /// Delete a row. Deleting a missing row is not an error.
    fn delete(&self, key: &RecordKey) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every row of one image.
    fn delete_image(&self, image: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every row of every image. Settings are kept.
    fn clear(&self) -> BoxFuture<'_, StorageResult<()>>;

    /// Read a single-value setting.
    fn setting(&self, name: &str) -> BoxFuture<'_, StorageResult<Option<String>>>;

    /// Write a single-value setting.
    fn set_setting(&self, name: &str, value: &str) -> BoxFuture<'_, StorageResult<()>>;
}

/// Trait for durable row stores (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait Storage {
    /// Insert or replace a row.
    fn put(&self, key: &RecordKey, row: &Row) -> BoxFuture<'_, StorageResult<()>>;

    /// All rows stored for an image, in no particular order.
    fn rows_for_image(&self, image: &str) -> BoxFuture<'_, StorageResult<Vec<Row>>>;

    /// Delete a row. Deleting a missing row is not an error.
    fn delete(&self, key: &RecordKey) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every row of one image.
    fn delete_image(&self, image: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every row of every image. Settings are kept.
    fn clear(&self) -> BoxFuture<'_, StorageResult<()>>;

    /// Read a single-value setting.
    fn setting(&self, name: &str) -> BoxFuture<'_, StorageResult<Option<String>>>;

    /// Write a single-value setting.
    fn set_setting(&self, name: &str, value: &str) -> BoxFuture<'_, StorageResult<()>>;
}

/// Create a platform-appropriate storage backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<std::sync::Arc<FileStorage>> {
    Ok(std::sync::Arc::new(FileStorage::default_location()?))
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<std::sync::Arc<IndexedDbStorage>> {
    Ok(std::sync::Arc::new(IndexedDbStorage::new()))
}

/// Convenience type alias for platform-specific storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = FileStorage;

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = IndexedDbStorage;
