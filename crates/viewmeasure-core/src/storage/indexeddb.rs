//! IndexedDB storage implementation for WebAssembly.
//!
//! Rows live in the `measurements` object store under the composite key
//! `image \u{1f} id`, so all rows of one image form a contiguous key range.

use super::{BoxFuture, RecordKey, Row, Storage, StorageError, StorageResult};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{IdbDatabase, IdbKeyRange, IdbObjectStore, IdbRequest, IdbTransactionMode};

const DB_NAME: &str = "viewmeasure";
const DB_VERSION: u32 = 1;
const MEASUREMENTS_STORE: &str = "measurements";
const SETTINGS_STORE: &str = "settings";
/// Separates the image identifier from the id inside a key.
const KEY_SEPARATOR: char = '\u{1f}';

/// IndexedDB-based storage for WebAssembly.
///
/// Note: This is intentionally not Send/Sync since WASM is single-threaded
/// and IndexedDB handles are not thread-safe.
pub struct IndexedDbStorage {
    /// Cached database connection.
    db: Rc<RefCell<Option<IdbDatabase>>>,
}

impl IndexedDbStorage {
    /// Create a new IndexedDB storage.
    ///
    /// Note: The actual database connection is established lazily on first use.
    pub fn new() -> Self {
        Self {
            db: Rc::new(RefCell::new(None)),
        }
    }

    /// Open or create the database, returning a handle.
    async fn get_db(&self) -> StorageResult<IdbDatabase> {
        if let Some(db) = self.db.borrow().as_ref() {
            return Ok(db.clone());
        }

        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("No window object".to_string()))?;

        let idb_factory = window
            .indexed_db()
            .map_err(|e| StorageError::Unavailable(format!("IndexedDB error: {:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable("IndexedDB not available".to_string()))?;

        let open_request = idb_factory
            .open_with_u32(DB_NAME, DB_VERSION)
            .map_err(|e| StorageError::Unavailable(format!("Failed to open DB: {:?}", e)))?;

        let onupgrade = Closure::once(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
            let Some(target) = event.target() else {
                return;
            };
            let request: IdbRequest = target.unchecked_into();
            let Ok(result) = request.result() else {
                return;
            };
            let db: IdbDatabase = result.unchecked_into();
            for name in [MEASUREMENTS_STORE, SETTINGS_STORE] {
                if !db.object_store_names().contains(name) {
                    if let Err(e) = db.create_object_store(name) {
                        log::error!("Failed to create object store {}: {:?}", name, e);
                    }
                }
            }
        }) as Box<dyn FnOnce(_)>);

        open_request.set_onupgradeneeded(Some(onupgrade.as_ref().unchecked_ref()));
        onupgrade.forget();

        let db = await_idb_request::<IdbDatabase>(&open_request).await?;
        *self.db.borrow_mut() = Some(db.clone());
        Ok(db)
    }

    fn get_store(
        &self,
        db: &IdbDatabase,
        name: &str,
        mode: IdbTransactionMode,
    ) -> StorageResult<IdbObjectStore> {
        let transaction = db
            .transaction_with_str_and_mode(name, mode)
            .map_err(|e| StorageError::Other(format!("Transaction error: {:?}", e)))?;

        transaction
            .object_store(name)
            .map_err(|e| StorageError::Other(format!("Store error: {:?}", e)))
    }
}

impl Default for IndexedDbStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn row_key(key: &RecordKey) -> JsValue {
    // Zero-padded so string order matches numeric order
    JsValue::from_str(&format!("{}{}{:020}", key.image, KEY_SEPARATOR, key.id))
}

/// Key range covering every row of one image.
fn image_range(image: &str) -> StorageResult<IdbKeyRange> {
    let lower = JsValue::from_str(&format!("{}{}", image, KEY_SEPARATOR));
    // The separator's successor bounds the range from above
    let upper = JsValue::from_str(&format!("{}\u{20}", image));
    IdbKeyRange::bound_with_lower_open_and_upper_open(&lower, &upper, false, true)
        .map_err(|e| StorageError::Other(format!("Key range error: {:?}", e)))
}

fn request_error(what: &str, e: JsValue) -> StorageError {
    let message = format!("{:?}", e);
    if message.contains("QuotaExceeded") {
        StorageError::QuotaExceeded
    } else {
        StorageError::Other(format!("{} error: {}", what, message))
    }
}

impl Storage for IndexedDbStorage {
    fn put(&self, key: &RecordKey, row: &Row) -> BoxFuture<'_, StorageResult<()>> {
        let js_key = row_key(key);
        let json = match serde_json::to_string(row) {
            Ok(j) => j,
            Err(e) => {
                return Box::pin(async move { Err(StorageError::Serialization(e.to_string())) });
            }
        };

        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, MEASUREMENTS_STORE, IdbTransactionMode::Readwrite)?;
            let request = store
                .put_with_key(&JsValue::from_str(&json), &js_key)
                .map_err(|e| request_error("Put", e))?;
            await_idb_request::<JsValue>(&request).await?;
            Ok(())
        })
    }

    fn rows_for_image(&self, image: &str) -> BoxFuture<'_, StorageResult<Vec<Row>>> {
        let image = image.to_string();
        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, MEASUREMENTS_STORE, IdbTransactionMode::Readonly)?;
            let range = image_range(&image)?;
            let request = store
                .get_all_with_key(&range)
                .map_err(|e| request_error("GetAll", e))?;
            let result = await_idb_request::<js_sys::Array>(&request).await?;

            let mut rows = Vec::new();
            for i in 0..result.length() {
                match result.get(i).as_string().map(|s| serde_json::from_str::<Row>(&s)) {
                    Some(Ok(row)) => rows.push(row),
                    // Unparseable rows are handed on as null so the gateway counts them
                    _ => rows.push(Row::Null),
                }
            }
            Ok(rows)
        })
    }

    fn delete(&self, key: &RecordKey) -> BoxFuture<'_, StorageResult<()>> {
        let js_key = row_key(key);
        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, MEASUREMENTS_STORE, IdbTransactionMode::Readwrite)?;
            let request = store.delete(&js_key).map_err(|e| request_error("Delete", e))?;
            await_idb_request::<JsValue>(&request).await?;
            Ok(())
        })
    }

    fn delete_image(&self, image: &str) -> BoxFuture<'_, StorageResult<()>> {
        let image = image.to_string();
        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, MEASUREMENTS_STORE, IdbTransactionMode::Readwrite)?;
            let range = image_range(&image)?;
            let request = store.delete(&range).map_err(|e| request_error("Delete", e))?;
            await_idb_request::<JsValue>(&request).await?;
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, MEASUREMENTS_STORE, IdbTransactionMode::Readwrite)?;
            let request = store.clear().map_err(|e| request_error("Clear", e))?;
            await_idb_request::<JsValue>(&request).await?;
            Ok(())
        })
    }

    fn setting(&self, name: &str) -> BoxFuture<'_, StorageResult<Option<String>>> {
        let name = name.to_string();
        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, SETTINGS_STORE, IdbTransactionMode::Readonly)?;
            let request = store
                .get(&JsValue::from_str(&name))
                .map_err(|e| request_error("Get", e))?;
            let result = await_idb_request::<JsValue>(&request).await?;
            Ok(result.as_string())
        })
    }

    fn set_setting(&self, name: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let db = self.get_db().await?;
            let store = self.get_store(&db, SETTINGS_STORE, IdbTransactionMode::Readwrite)?;
            let request = store
                .put_with_key(&JsValue::from_str(&value), &JsValue::from_str(&name))
                .map_err(|e| request_error("Put", e))?;
            await_idb_request::<JsValue>(&request).await?;
            Ok(())
        })
    }
}

/// Helper to await an IndexedDB request using a Promise.
async fn await_idb_request<T: JsCast>(request: &IdbRequest) -> StorageResult<T> {
    use wasm_bindgen_futures::JsFuture;

    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let onsuccess = Closure::once(Box::new(move |event: web_sys::Event| {
            let result = event
                .target()
                .map(|target| target.unchecked_into::<IdbRequest>())
                .and_then(|request| request.result().ok())
                .unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::NULL, &result);
        }) as Box<dyn FnOnce(_)>);

        let onerror = Closure::once(Box::new(move |event: web_sys::Event| {
            let message = event
                .target()
                .map(|target| target.unchecked_into::<IdbRequest>())
                .and_then(|request| request.error().ok().flatten())
                .map(|error| error.name())
                .unwrap_or_else(|| "IndexedDB request failed".to_string());
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str(&message));
        }) as Box<dyn FnOnce(_)>);

        request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
        request.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        onsuccess.forget();
        onerror.forget();
    });

    JsFuture::from(promise)
        .await
        .map_err(|e| request_error("IndexedDB request", e))?
        .dyn_into::<T>()
        .map_err(|_| StorageError::Other("Type conversion failed".to_string()))
}
