//! Persistence gateway: measurements in, rows out.
//!
//! Rows carry only what is needed to rebuild a measurement. Distance and
//! units are recomputed from the session calibration at load time, so a
//! changed conversion factor reinterprets historical measurements.

use crate::geometry::{Calibration, Endpoint, Measurement, MeasurementId};
use crate::storage::{RecordKey, Row, Storage, StorageError, StorageResult, WriteOp};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Setting key holding the last used measurement color.
pub const COLOR_SETTING: &str = "color";

/// Persisted shape of one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: MeasurementId,
    pub image: String,
    pub p1x: f64,
    pub p1y: f64,
    pub p2x: f64,
    pub p2y: f64,
    pub name: String,
    pub color: String,
}

impl MeasurementRecord {
    pub fn from_measurement(measurement: &Measurement, image: &str) -> Self {
        Self {
            id: measurement.id,
            image: image.to_string(),
            p1x: measurement.p1.x(),
            p1y: measurement.p1.y(),
            p2x: measurement.p2.x(),
            p2y: measurement.p2.y(),
            name: measurement.name.clone(),
            color: measurement.color.clone(),
        }
    }

    /// Rebuild the measurement, recomputing its distance.
    pub fn into_measurement(self, calibration: &Calibration) -> Measurement {
        Measurement::new(
            self.id,
            Endpoint::new(Point::new(self.p1x, self.p1y), self.color.clone()),
            Endpoint::new(Point::new(self.p2x, self.p2y), self.color.clone()),
            self.name,
            self.color,
            calibration,
            self.image,
        )
    }

    fn is_finite(&self) -> bool {
        [self.p1x, self.p1y, self.p2x, self.p2y]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Result of loading one image.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Valid measurements ordered by id.
    pub measurements: Vec<Measurement>,
    /// Rows that were dropped as malformed or duplicate.
    pub skipped: usize,
}

/// Async CRUD over measurement rows.
pub struct MeasurementStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for MeasurementStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> MeasurementStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Load every measurement of an image.
    ///
    /// A row that does not decode is skipped; the rest still load.
    pub async fn load(&self, image: &str, calibration: &Calibration) -> StorageResult<LoadReport> {
        let rows = self.storage.rows_for_image(image).await?;
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for row in rows {
            match decode_row(row, image) {
                Ok(record) if seen.insert(record.id) => {
                    report.measurements.push(record.into_measurement(calibration));
                }
                Ok(record) => {
                    log::warn!("Skipping duplicate row {} for image {}", record.id, image);
                    report.skipped += 1;
                }
                Err(e) => {
                    log::warn!("Skipping malformed row for image {}: {}", image, e);
                    report.skipped += 1;
                }
            }
        }

        report.measurements.sort_by_key(|m| m.id);
        log::debug!(
            "Loaded {} measurements for {} ({} skipped)",
            report.measurements.len(),
            image,
            report.skipped
        );
        Ok(report)
    }

    /// Upsert every measurement of an image, replacing rows by id.
    pub async fn save_all(&self, measurements: &[Measurement], image: &str) -> StorageResult<()> {
        for measurement in measurements {
            let record = MeasurementRecord::from_measurement(measurement, image);
            let row = serde_json::to_value(&record)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.storage.put(&RecordKey::new(image, record.id), &row).await?;
        }
        Ok(())
    }

    pub async fn remove(&self, id: MeasurementId, image: &str) -> StorageResult<()> {
        self.storage.delete(&RecordKey::new(image, id)).await
    }

    /// Delete every stored measurement of every image.
    pub async fn clear(&self) -> StorageResult<()> {
        self.storage.clear().await
    }

    pub async fn clear_image(&self, image: &str) -> StorageResult<()> {
        self.storage.delete_image(image).await
    }

    /// The last used measurement color, if one was ever saved.
    pub async fn load_color(&self) -> StorageResult<Option<String>> {
        self.storage.setting(COLOR_SETTING).await
    }

    pub async fn save_color(&self, color: &str) -> StorageResult<()> {
        self.storage.set_setting(COLOR_SETTING, color).await
    }

    /// Apply one queued write.
    pub async fn apply(&self, op: &WriteOp) -> StorageResult<()> {
        match op {
            WriteOp::SaveAll { image, measurements } => self.save_all(measurements, image).await,
            WriteOp::Remove { image, id } => self.remove(*id, image).await,
            WriteOp::ClearImage { image } => self.clear_image(image).await,
            WriteOp::ClearAll => self.clear().await,
            WriteOp::SaveColor { color } => self.save_color(color).await,
        }
    }
}

fn decode_row(row: Row, image: &str) -> Result<MeasurementRecord, String> {
    let record: MeasurementRecord = serde_json::from_value(row).map_err(|e| e.to_string())?;
    if record.image != image {
        return Err(format!("row belongs to image {:?}", record.image));
    }
    if !record.is_finite() {
        return Err(format!("row {} has a non-finite coordinate", record.id));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pollster::block_on;
    use serde_json::json;

    fn calibration() -> Calibration {
        Calibration {
            conversion_factor: 2.0,
            units: "um".to_string(),
        }
    }

    fn measurement(id: MeasurementId, x2: f64) -> Measurement {
        Measurement::new(
            id,
            Endpoint::new(Point::new(0.0, 0.0), "#ff0000"),
            Endpoint::new(Point::new(x2, 0.0), "#ff0000"),
            format!("M{}", id + 1),
            "#ff0000",
            &calibration(),
            "slide",
        )
    }

    fn store() -> MeasurementStore<MemoryStorage> {
        MeasurementStore::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_save_and_load() {
        let store = store();
        block_on(store.save_all(&[measurement(0, 10.0), measurement(1, 20.0)], "slide")).unwrap();

        let report = block_on(store.load("slide", &calibration())).unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.measurements.len(), 2);
        assert_eq!(report.measurements[0], measurement(0, 10.0));
        assert!((report.measurements[1].distance - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_save_all_is_idempotent() {
        let store = store();
        let set = [measurement(0, 10.0), measurement(1, 20.0)];
        block_on(store.save_all(&set, "slide")).unwrap();
        let once = block_on(store.storage().rows_for_image("slide")).unwrap();

        block_on(store.save_all(&set, "slide")).unwrap();
        let twice = block_on(store.storage().rows_for_image("slide")).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_distance_recomputed_from_calibration() {
        let store = store();
        block_on(store.save_all(&[measurement(0, 10.0)], "slide")).unwrap();

        let other = Calibration {
            conversion_factor: 0.5,
            units: "mm".to_string(),
        };
        let report = block_on(store.load("slide", &other)).unwrap();
        assert!((report.measurements[0].distance - 5.0).abs() < f64::EPSILON);
        assert_eq!(report.measurements[0].units, "mm");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let store = store();
        block_on(store.save_all(&[measurement(0, 10.0)], "slide")).unwrap();
        let storage = store.storage();
        block_on(storage.put(&RecordKey::new("slide", 7), &json!({"id": 7, "image": "slide"}))).unwrap();
        block_on(storage.put(
            &RecordKey::new("slide", 8),
            &json!({"id": 8, "image": "slide", "p1x": "left", "p1y": 0.0,
                    "p2x": 1.0, "p2y": 1.0, "name": "bad", "color": "#000"}),
        ))
        .unwrap();

        let report = block_on(store.load("slide", &calibration())).unwrap();
        assert_eq!(report.measurements.len(), 1);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_remove_and_clear_image() {
        let store = store();
        block_on(store.save_all(&[measurement(0, 10.0), measurement(1, 20.0)], "slide")).unwrap();
        block_on(store.save_all(&[measurement(0, 10.0)], "other")).unwrap();

        block_on(store.remove(0, "slide")).unwrap();
        let report = block_on(store.load("slide", &calibration())).unwrap();
        assert_eq!(report.measurements.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1]);

        block_on(store.clear_image("slide")).unwrap();
        assert!(block_on(store.load("slide", &calibration())).unwrap().measurements.is_empty());
        assert_eq!(block_on(store.load("other", &calibration())).unwrap().measurements.len(), 1);
    }

    #[test]
    fn test_color_setting() {
        let store = store();
        assert_eq!(block_on(store.load_color()).unwrap(), None);
        block_on(store.apply(&WriteOp::SaveColor { color: "#abcdef".into() })).unwrap();
        assert_eq!(block_on(store.load_color()).unwrap().as_deref(), Some("#abcdef"));
    }
}
