//! ViewMeasure Core Library
//!
//! Platform-agnostic measurement logic for image viewer overlays: geometry,
//! the measurement session state machine, persistence and CSV export.

pub mod config;
pub mod events;
pub mod export;
pub mod gateway;
pub mod geometry;
pub mod input;
pub mod overlay;
pub mod session;
pub mod storage;
pub mod viewport;

pub use config::{ConfigError, ResetScope, SessionConfig};
pub use events::SessionEvent;
pub use export::{CsvExport, ExportError, build_export, export_csv};
pub use gateway::{LoadReport, MeasurementRecord, MeasurementStore};
pub use geometry::{Calibration, Endpoint, Measurement, MeasurementId, RenderMetrics, distance};
pub use input::{KeyChord, KeyResponse, Modifiers, ShortcutAction, Viewer, ViewerEvent, ViewerResponse};
pub use overlay::{DrawSurface, Overlay, Primitive, PrimitiveId};
pub use session::{LoadedImage, PendingLoad, RedoEntry, Session};
pub use storage::{MemoryStorage, Storage, StorageError, StorageResult, WriteStats};
pub use viewport::Viewport;
