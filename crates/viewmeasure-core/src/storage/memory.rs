//! In-memory storage implementation.

use super::{BoxFuture, RecordKey, Row, Storage, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory storage for testing and ephemeral use.
///
/// A row capacity can be set to reproduce quota failures, and the whole
/// store can be switched off to reproduce an unavailable backend.
#[derive(Default)]
pub struct MemoryStorage {
    rows: RwLock<BTreeMap<RecordKey, Row>>,
    settings: RwLock<HashMap<String, String>>,
    capacity: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects inserts beyond `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of rows across all images.
    pub fn row_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn put(&self, key: &RecordKey, row: &Row) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.clone();
        let row = row.clone();
        Box::pin(async move {
            self.check_available()?;
            let mut rows = self.rows.write().map_err(lock_error)?;
            if let Some(capacity) = self.capacity {
                if !rows.contains_key(&key) && rows.len() >= capacity {
                    return Err(StorageError::QuotaExceeded);
                }
            }
            rows.insert(key, row);
            Ok(())
        })
    }

    fn rows_for_image(&self, image: &str) -> BoxFuture<'_, StorageResult<Vec<Row>>> {
        let image = image.to_string();
        Box::pin(async move {
            self.check_available()?;
            let rows = self.rows.read().map_err(lock_error)?;
            Ok(rows
                .iter()
                .filter(|(key, _)| key.image == image)
                .map(|(_, row)| row.clone())
                .collect())
        })
    }

    fn delete(&self, key: &RecordKey) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.clone();
        Box::pin(async move {
            self.check_available()?;
            let mut rows = self.rows.write().map_err(lock_error)?;
            rows.remove(&key);
            Ok(())
        })
    }

    fn delete_image(&self, image: &str) -> BoxFuture<'_, StorageResult<()>> {
        let image = image.to_string();
        Box::pin(async move {
            self.check_available()?;
            let mut rows = self.rows.write().map_err(lock_error)?;
            rows.retain(|key, _| key.image != image);
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.check_available()?;
            let mut rows = self.rows.write().map_err(lock_error)?;
            rows.clear();
            Ok(())
        })
    }

    fn setting(&self, name: &str) -> BoxFuture<'_, StorageResult<Option<String>>> {
        let name = name.to_string();
        Box::pin(async move {
            self.check_available()?;
            let settings = self.settings.read().map_err(lock_error)?;
            Ok(settings.get(&name).cloned())
        })
    }

    fn set_setting(&self, name: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        let value = value.to_string();
        Box::pin(async move {
            self.check_available()?;
            let mut settings = self.settings.write().map_err(lock_error)?;
            settings.insert(name, value);
            Ok(())
        })
    }
}
