//! Session lifecycle notifications.

use crate::geometry::MeasurementId;

/// Events emitted by a [`Session`](crate::session::Session).
///
/// The session queues these; the shell drains them with `poll_events()`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A measurement was completed or restored by redo.
    MeasurementAdded { id: MeasurementId },
    /// A measurement left the list, by undo or by deleting the selection.
    MeasurementRemoved { id: MeasurementId },
    /// The selected measurement was deleted. Follows its `MeasurementRemoved`.
    SelectedMeasurementDeleted { id: MeasurementId },
    /// Everything was cleared.
    MeasurementsReset,
    /// Measurements for an image finished loading.
    DataLoaded { image: String, count: usize },
    /// The session switched to another image; its measurements are loading.
    PageChanged { image: String },
    /// A measurement was renamed or recolored.
    MeasurementUpdated { id: MeasurementId },
    SelectionChanged { selected: Option<MeasurementId> },
    /// A storage write or read failed; the in-memory state is still valid
    /// but may not survive a reload.
    StorageWarning { message: String },
}

impl SessionEvent {
    /// Stable wire name of the event, as used in logs and replay output.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::MeasurementAdded { .. } => "measurement-added",
            SessionEvent::MeasurementRemoved { .. } => "measurement-removed",
            SessionEvent::SelectedMeasurementDeleted { .. } => "delete-selected-measurement",
            SessionEvent::MeasurementsReset => "measurements-reset",
            SessionEvent::DataLoaded { .. } => "data-loaded",
            SessionEvent::PageChanged { .. } => "page-changed",
            SessionEvent::MeasurementUpdated { .. } => "measurement-updated",
            SessionEvent::SelectionChanged { .. } => "selection-changed",
            SessionEvent::StorageWarning { .. } => "storage-warning",
        }
    }
}
