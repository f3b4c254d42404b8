//! File-based storage implementation for native platforms.

use super::{BoxFuture, RecordKey, Row, Storage, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const IMAGES_DIR: &str = "images";
const SETTINGS_FILE: &str = "settings.json";
/// Longest escaped stem kept verbatim; longer ones are cut and hashed so
/// the file name stays under the usual 255-byte limit.
const MAX_STEM_LEN: usize = 200;

/// On-disk layout of one image's rows.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ImageFile {
    image: String,
    rows: BTreeMap<String, Row>,
}

/// File-based storage for native platforms.
///
/// Each image gets one JSON file under `images/`; settings live in
/// `settings.json` next to it.
pub struct FileStorage {
    /// Base directory for storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        let images = base_path.join(IMAGES_DIR);
        if !images.exists() {
            fs::create_dir_all(&images).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/viewmeasure/`
    /// On Windows: `%LOCALAPPDATA%\viewmeasure\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("viewmeasure"))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Get the file path for an image identifier.
    ///
    /// Identifiers are usually URLs, so every byte outside `[A-Za-z0-9-]` is
    /// hex-escaped. Escaped stems longer than [`MAX_STEM_LEN`] are truncated
    /// and suffixed with `~` and a hash of the full identifier; `~` never
    /// appears in an escaped stem, so the two forms cannot meet. The image
    /// stored inside the file catches the remaining hash collisions.
    fn image_path(&self, image: &str) -> PathBuf {
        let mut safe = String::with_capacity(image.len());
        for byte in image.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(byte as char);
            } else {
                safe.push_str(&format!("_{:02x}", byte));
            }
        }
        if safe.len() > MAX_STEM_LEN {
            // Escaped stems are ASCII, so any byte index is a char boundary
            safe.truncate(MAX_STEM_LEN);
            safe.push_str(&format!("~{:016x}", fnv1a(image.as_bytes())));
        }
        self.base_path.join(IMAGES_DIR).join(format!("{}.json", safe))
    }

    fn settings_path(&self) -> PathBuf {
        self.base_path.join(SETTINGS_FILE)
    }

    fn read_image(&self, image: &str) -> StorageResult<ImageFile> {
        let path = self.image_path(image);
        if !path.exists() {
            return Ok(ImageFile {
                image: image.to_string(),
                rows: BTreeMap::new(),
            });
        }
        let file: ImageFile = read_json(&path)?;
        if file.image != image {
            return Err(StorageError::Serialization(format!(
                "{} belongs to image {:?}, expected {:?}",
                path.display(),
                file.image,
                image
            )));
        }
        Ok(file)
    }

    fn write_image(&self, file: &ImageFile) -> StorageResult<()> {
        let path = self.image_path(&file.image);
        if file.rows.is_empty() {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            return Ok(());
        }
        write_json(&path, file)
    }

    fn read_settings(&self) -> StorageResult<HashMap<String, String>> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        read_json(&path)
    }
}

/// 64-bit FNV-1a. File names must not change between builds, which rules
/// out `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> StorageResult<T> {
    let json = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    // Write to a sibling temp file first so a crash never leaves half a file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| StorageError::Io(format!("Failed to replace {}: {}", path.display(), e)))
}

impl Storage for FileStorage {
    fn put(&self, key: &RecordKey, row: &Row) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.clone();
        let row = row.clone();
        Box::pin(async move {
            let mut file = self.read_image(&key.image)?;
            file.rows.insert(key.id.to_string(), row);
            self.write_image(&file)
        })
    }

    fn rows_for_image(&self, image: &str) -> BoxFuture<'_, StorageResult<Vec<Row>>> {
        let image = image.to_string();
        Box::pin(async move {
            let file = self.read_image(&image)?;
            Ok(file.rows.into_values().collect())
        })
    }

    fn delete(&self, key: &RecordKey) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.clone();
        Box::pin(async move {
            let mut file = self.read_image(&key.image)?;
            if file.rows.remove(&key.id.to_string()).is_some() {
                self.write_image(&file)?;
            }
            Ok(())
        })
    }

    fn delete_image(&self, image: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.image_path(image);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, StorageResult<()>> {
        let dir = self.base_path.join(IMAGES_DIR);
        Box::pin(async move {
            if !dir.exists() {
                return Ok(());
            }
            let entries = fs::read_dir(&dir)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    fs::remove_file(&path).map_err(|e| {
                        StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                    })?;
                }
            }
            Ok(())
        })
    }

    fn setting(&self, name: &str) -> BoxFuture<'_, StorageResult<Option<String>>> {
        let name = name.to_string();
        Box::pin(async move {
            let settings = self.read_settings()?;
            Ok(settings.get(&name).cloned())
        })
    }

    fn set_setting(&self, name: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let name = name.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut settings = self.read_settings()?;
            settings.insert(name, value);
            write_json(&self.settings_path(), &settings)
        })
    }
}
