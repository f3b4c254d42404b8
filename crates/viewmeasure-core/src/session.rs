//! The measurement session: placement state machine, undo/redo, selection,
//! per-image loading and ordered persistence.
//!
//! A session is either idle or holds a pending first point. Every mutation
//! updates the in-memory model and the overlay immediately, queues the
//! writes it implies, and records an event. Writes reach storage only when
//! the host awaits [`Session::flush`]; a failed write degrades persistence
//! but never touches the model.

use crate::config::{ConfigError, ResetScope, SessionConfig};
use crate::events::SessionEvent;
use crate::export::build_export;
use crate::gateway::{LoadReport, MeasurementStore};
use crate::geometry::{Calibration, Endpoint, Measurement, MeasurementId};
use crate::input::{KeyChord, KeyResponse, ShortcutAction, Viewer, ViewerEvent, ViewerResponse};
use crate::overlay::{DrawSurface, Overlay};
use crate::storage::{Storage, StorageResult, WriteOp, WriteQueue, WriteStats};
use kurbo::Point;
use std::sync::Arc;

/// Prompt shown before the reset shortcut clears everything.
pub const RESET_PROMPT: &str = "Are you sure you want to reset all measurements and annotations?";

/// Something undo took out of the model, replayable by redo.
#[derive(Debug, Clone, PartialEq)]
pub enum RedoEntry {
    /// A pending first point.
    Point(Endpoint),
    /// A completed measurement, with its original id.
    Measurement(Measurement),
}

/// An image load the host must drive to completion.
///
/// Holds its own handle to the store so it can be awaited while the
/// session keeps handling input.
pub struct PendingLoad<S: Storage> {
    store: MeasurementStore<S>,
    image: String,
    generation: u64,
    calibration: Calibration,
}

impl<S: Storage> PendingLoad<S> {
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Read the image's rows and the stored color.
    pub async fn fetch(self) -> LoadedImage {
        let measurements = self.store.load(&self.image, &self.calibration).await;
        let color = self.store.load_color().await;
        LoadedImage {
            image: self.image,
            generation: self.generation,
            measurements,
            color,
        }
    }
}

/// Result of a [`PendingLoad`], applied with [`Session::apply_load`].
#[derive(Debug)]
pub struct LoadedImage {
    pub image: String,
    pub generation: u64,
    pub measurements: StorageResult<LoadReport>,
    pub color: StorageResult<Option<String>>,
}

/// A live measurement session attached to one viewer.
pub struct Session<S: Storage, D: DrawSurface> {
    config: SessionConfig,
    calibration: Calibration,
    store: MeasurementStore<S>,
    overlay: Overlay<D>,
    writes: WriteQueue,
    events: Vec<SessionEvent>,

    measurements: Vec<Measurement>,
    pending_point: Option<Endpoint>,
    redo_stack: Vec<RedoEntry>,
    selected: Option<MeasurementId>,
    image_identifier: String,
    measurement_color: String,
    next_id: MeasurementId,

    /// Bumped on every page change; loads from older generations are stale.
    generation: u64,
    loading: bool,
    /// The color was changed after the current load started.
    color_changed_during_load: bool,
    persistence_degraded: bool,
}

impl<S: Storage, D: DrawSurface> Session<S, D> {
    /// Create a session for `image`.
    ///
    /// The session starts out loading; drive the returned load and hand its
    /// result to [`Session::apply_load`]. Fails if the config does not
    /// validate.
    pub fn new(
        config: SessionConfig,
        storage: Arc<S>,
        surface: D,
        image: impl Into<String>,
    ) -> Result<(Self, PendingLoad<S>), ConfigError> {
        config.validate()?;
        let calibration = config.calibration();
        let mut session = Self {
            measurement_color: config.measurement_color.clone(),
            config,
            calibration,
            store: MeasurementStore::new(storage),
            overlay: Overlay::new(surface, 1.0),
            writes: WriteQueue::new(),
            events: Vec::new(),
            measurements: Vec::new(),
            pending_point: None,
            redo_stack: Vec::new(),
            selected: None,
            image_identifier: String::new(),
            next_id: 0,
            generation: 0,
            loading: false,
            color_changed_during_load: false,
            persistence_degraded: false,
        };
        let load = session.begin_load(image.into());
        Ok((session, load))
    }

    /// Create a session and wait for its first image to load.
    pub async fn open(
        config: SessionConfig,
        storage: Arc<S>,
        surface: D,
        image: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let (mut session, load) = Self::new(config, storage, surface, image)?;
        let loaded = load.fetch().await;
        session.apply_load(loaded);
        Ok(session)
    }

    // --- accessors ---

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn store(&self) -> &MeasurementStore<S> {
        &self.store
    }

    pub fn overlay(&self) -> &Overlay<D> {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut Overlay<D> {
        &mut self.overlay
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn measurement(&self, id: MeasurementId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.id == id)
    }

    pub fn pending_point(&self) -> Option<&Endpoint> {
        self.pending_point.as_ref()
    }

    /// Check if a first point is placed and the second is awaited.
    pub fn is_measuring(&self) -> bool {
        self.pending_point.is_some()
    }

    pub fn redo_stack(&self) -> &[RedoEntry] {
        &self.redo_stack
    }

    pub fn can_undo(&self) -> bool {
        self.pending_point.is_some() || !self.measurements.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn selected(&self) -> Option<&Measurement> {
        self.selected.and_then(|id| self.measurement(id))
    }

    pub fn image_identifier(&self) -> &str {
        &self.image_identifier
    }

    pub fn measurement_color(&self) -> &str {
        &self.measurement_color
    }

    /// Check if a load for the current image is still outstanding.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Check if any write has failed during this session.
    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    /// Number of writes waiting for [`Session::flush`].
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Applied and failed write counts since the session was created.
    pub fn write_stats(&self) -> WriteStats {
        self.writes.stats()
    }

    /// Take every event emitted since the last poll.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // --- placement ---

    /// Place a point at an image coordinate.
    ///
    /// The first point becomes pending; the second completes a measurement,
    /// whose id is returned. Either way the redo history is dropped.
    pub fn place_point(&mut self, position: Point) -> Option<MeasurementId> {
        if self.ignore_while_loading("place point") {
            return None;
        }
        self.redo_stack.clear();

        let Some(first) = self.pending_point.take() else {
            let point = Endpoint::new(position, self.measurement_color.clone());
            self.overlay.show_pending(&point);
            self.pending_point = Some(point);
            log::debug!("First point placed at ({}, {})", position.x, position.y);
            return None;
        };

        self.overlay.hide_pending();
        let id = self.next_id;
        self.next_id += 1;
        let measurement = Measurement::new(
            id,
            first,
            Endpoint::new(position, self.measurement_color.clone()),
            format!("{}{}", self.config.name_prefix, self.measurements.len() + 1),
            self.measurement_color.clone(),
            &self.calibration,
            self.image_identifier.clone(),
        );
        log::debug!("Measurement {} completed: {}", id, measurement.label());
        self.overlay.show_measurement(&measurement);
        self.measurements.push(measurement);
        self.queue_save_all();
        self.events.push(SessionEvent::MeasurementAdded { id });
        Some(id)
    }

    // --- undo / redo ---

    /// Undo the pending point, or else the most recent measurement.
    pub fn undo(&mut self) -> bool {
        if self.ignore_while_loading("undo") {
            return false;
        }

        if let Some(point) = self.pending_point.take() {
            self.overlay.hide_pending();
            self.redo_stack.push(RedoEntry::Point(point));
            log::debug!("Undo pending point");
            return true;
        }

        let Some(mut measurement) = self.measurements.pop() else {
            return false;
        };
        let id = measurement.id;
        self.overlay.hide_measurement(id);
        if self.selected == Some(id) {
            self.selected = None;
            self.events.push(SessionEvent::SelectionChanged { selected: None });
        }
        measurement.selected = false;
        self.redo_stack.push(RedoEntry::Measurement(measurement));
        self.queue_removal(id);
        log::debug!("Undo measurement {}", id);
        self.events.push(SessionEvent::MeasurementRemoved { id });
        true
    }

    /// Replay the most recently undone entry.
    ///
    /// A measurement comes back under its original id. An undone point is
    /// only restored while idle; with a point already pending it stays on
    /// the stack.
    pub fn redo(&mut self) -> bool {
        if self.ignore_while_loading("redo") {
            return false;
        }

        let restores_point = match self.redo_stack.last() {
            None => return false,
            Some(entry) => matches!(entry, RedoEntry::Point(_)),
        };
        if restores_point && self.pending_point.is_some() {
            return false;
        }

        match self.redo_stack.pop() {
            Some(RedoEntry::Point(point)) => {
                self.overlay.show_pending(&point);
                self.pending_point = Some(point);
                log::debug!("Redo pending point");
                true
            }
            Some(RedoEntry::Measurement(measurement)) => {
                let id = measurement.id;
                self.overlay.show_measurement(&measurement);
                self.measurements.push(measurement);
                self.queue_save_all();
                log::debug!("Redo measurement {}", id);
                self.events.push(SessionEvent::MeasurementAdded { id });
                true
            }
            None => false,
        }
    }

    // --- selection ---

    /// Index-ordered first measurement whose hit box contains `point`.
    pub fn hit_test(&self, point: Point) -> Option<MeasurementId> {
        self.measurements
            .iter()
            .find(|m| m.contains(point, self.config.hit_tolerance))
            .map(|m| m.id)
    }

    /// Select a measurement, deselecting any previous one.
    pub fn select(&mut self, id: MeasurementId) -> bool {
        if self.measurement(id).is_none() {
            return false;
        }
        if self.selected == Some(id) {
            return true;
        }
        self.set_highlight(false);
        self.selected = Some(id);
        self.set_highlight(true);
        self.events.push(SessionEvent::SelectionChanged { selected: Some(id) });
        true
    }

    pub fn deselect(&mut self) {
        if self.selected.is_none() {
            return;
        }
        self.set_highlight(false);
        self.selected = None;
        self.events.push(SessionEvent::SelectionChanged { selected: None });
    }

    /// Toggle selection of the measurement under an image coordinate.
    ///
    /// Clicking empty space changes nothing.
    pub fn click_at(&mut self, point: Point) -> Option<MeasurementId> {
        let hit = self.hit_test(point)?;
        if self.selected == Some(hit) {
            self.deselect();
        } else {
            self.select(hit);
        }
        self.selected
    }

    /// Delete the selected measurement. It can be brought back with redo.
    pub fn delete_selected(&mut self) -> bool {
        if self.ignore_while_loading("delete") {
            return false;
        }
        let Some(id) = self.selected.take() else {
            return false;
        };
        let Some(index) = self.measurements.iter().position(|m| m.id == id) else {
            return false;
        };

        let mut measurement = self.measurements.remove(index);
        self.overlay.hide_measurement(id);
        measurement.selected = false;
        self.redo_stack.push(RedoEntry::Measurement(measurement));
        self.queue_removal(id);
        log::debug!("Deleted selected measurement {}", id);
        self.events.push(SessionEvent::MeasurementRemoved { id });
        self.events.push(SessionEvent::SelectedMeasurementDeleted { id });
        self.events.push(SessionEvent::SelectionChanged { selected: None });
        true
    }

    // --- editing ---

    pub fn rename(&mut self, id: MeasurementId, name: impl Into<String>) -> bool {
        if self.ignore_while_loading("rename") {
            return false;
        }
        let name = name.into();
        let Some(measurement) = self.measurements.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if measurement.name == name {
            return true;
        }
        measurement.name = name;
        self.after_edit(id);
        true
    }

    /// Recolor one completed measurement.
    pub fn set_measurement_color(&mut self, id: MeasurementId, color: &str) -> bool {
        if self.ignore_while_loading("recolor") {
            return false;
        }
        let Some(measurement) = self.measurements.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        measurement.set_color(color);
        self.after_edit(id);
        true
    }

    /// Set the color for new measurements and the pending point.
    pub fn set_color(&mut self, color: impl Into<String>) {
        let color = color.into();
        if let Some(point) = self.pending_point.as_mut() {
            point.color = color.clone();
            self.overlay.recolor_pending(point);
        }
        if self.loading {
            self.color_changed_during_load = true;
        }
        self.writes.push(WriteOp::SaveColor { color: color.clone() });
        self.measurement_color = color;
    }

    // --- reset / zoom ---

    /// Drop every measurement, the pending point and the redo history, and
    /// purge storage according to the configured reset scope.
    pub fn reset(&mut self) -> bool {
        if self.ignore_while_loading("reset") {
            return false;
        }
        let count = self.measurements.len();
        self.overlay.clear();
        self.measurements.clear();
        self.redo_stack.clear();
        self.pending_point = None;
        if self.selected.take().is_some() {
            self.events.push(SessionEvent::SelectionChanged { selected: None });
        }

        match self.config.reset_scope {
            ResetScope::CurrentImage => self.writes.push(WriteOp::ClearImage {
                image: self.image_identifier.clone(),
            }),
            ResetScope::AllImages => self.writes.push(WriteOp::ClearAll),
        }
        log::info!("Reset {} measurements on {}", count, self.image_identifier);
        self.events.push(SessionEvent::MeasurementsReset);
        true
    }

    /// Re-derive render sizes for a new zoom ratio.
    pub fn adjust_to_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() || zoom <= 0.0 {
            log::warn!("Ignoring invalid zoom ratio {}", zoom);
            return;
        }
        self.overlay
            .adjust_to_zoom(zoom, &self.measurements, self.pending_point.as_ref());
    }

    // --- page changes and loading ---

    /// Switch to another image.
    ///
    /// In-memory state of the old image is dropped; its stored rows are
    /// kept. Mutating input is ignored until the returned load is applied.
    pub fn on_page_change(&mut self, image: impl Into<String>) -> PendingLoad<S> {
        let image = image.into();
        log::info!("Page changed from {} to {}", self.image_identifier, image);
        self.overlay.clear();
        self.measurements.clear();
        self.redo_stack.clear();
        self.pending_point = None;
        self.selected = None;
        let load = self.begin_load(image.clone());
        self.events.push(SessionEvent::PageChanged { image });
        load
    }

    /// Apply a finished load. Returns false if it was superseded.
    pub fn apply_load(&mut self, loaded: LoadedImage) -> bool {
        if loaded.generation != self.generation || loaded.image != self.image_identifier {
            log::debug!(
                "Discarding stale load of {} (generation {}, current {})",
                loaded.image,
                loaded.generation,
                self.generation
            );
            return false;
        }
        self.loading = false;

        match loaded.color {
            Ok(Some(color)) if !self.color_changed_during_load => self.measurement_color = color,
            Ok(_) => {}
            Err(e) => self.storage_warning(format!("Failed to load measurement color: {}", e)),
        }
        self.color_changed_during_load = false;

        let measurements = match loaded.measurements {
            Ok(report) => report.measurements,
            Err(e) => {
                self.storage_warning(format!("Failed to load measurements for {}: {}", loaded.image, e));
                Vec::new()
            }
        };

        if let Some(max) = measurements.iter().map(|m| m.id).max() {
            self.next_id = self.next_id.max(max + 1);
        }
        for measurement in &measurements {
            self.overlay.show_measurement(measurement);
        }
        self.measurements = measurements;
        log::info!(
            "Loaded {} measurements for {}",
            self.measurements.len(),
            self.image_identifier
        );
        self.events.push(SessionEvent::DataLoaded {
            image: loaded.image,
            count: self.measurements.len(),
        });
        true
    }

    /// Flush pending writes, then switch images and wait for the load.
    pub async fn change_page(&mut self, image: impl Into<String>) -> bool {
        self.flush().await;
        let load = self.on_page_change(image);
        let loaded = load.fetch().await;
        self.apply_load(loaded)
    }

    /// Apply queued writes in the order they were issued.
    ///
    /// Returns the number of writes that succeeded. Failures are reported
    /// as [`SessionEvent::StorageWarning`] and do not stop later writes.
    pub async fn flush(&mut self) -> usize {
        let mut applied = 0;
        while let Some(op) = self.writes.pop() {
            match self.store.apply(&op).await {
                Ok(()) => {
                    self.writes.record_applied();
                    applied += 1;
                }
                Err(e) => {
                    self.writes.record_failed();
                    self.storage_warning(format!("Failed to {}: {}", op.kind(), e));
                }
            }
        }
        applied
    }

    // --- host integration ---

    /// React to a viewer event.
    pub fn handle_viewer_event(&mut self, event: ViewerEvent, viewer: &impl Viewer) -> ViewerResponse<S> {
        let mut response = ViewerResponse::default();
        match event {
            ViewerEvent::DoubleClick { position, quick } => {
                self.sync_zoom(viewer.zoom());
                self.place_point(viewer.screen_to_image(position));
                response.prevent_default = !quick;
            }
            ViewerEvent::Click { position } => {
                self.click_at(viewer.screen_to_image(position));
            }
            ViewerEvent::Zoom { ratio } => self.adjust_to_zoom(ratio),
            ViewerEvent::Rotate => response.reset_rotation = true,
            ViewerEvent::PageChanged { image_identifier } => {
                response.load = Some(self.on_page_change(image_identifier));
            }
        }
        response
    }

    /// React to a key press.
    ///
    /// `confirm` is asked before a reset; answering false cancels it.
    pub fn handle_key(&mut self, chord: &KeyChord, confirm: impl FnOnce(&str) -> bool) -> KeyResponse {
        let Some(action) = ShortcutAction::from_chord(chord) else {
            return KeyResponse::default();
        };
        let mut response = KeyResponse {
            handled: true,
            export: None,
        };
        match action {
            ShortcutAction::Reset => {
                if confirm(RESET_PROMPT) {
                    self.reset();
                }
            }
            ShortcutAction::Undo => {
                self.undo();
            }
            ShortcutAction::Redo => {
                self.redo();
            }
            ShortcutAction::Export => match build_export(&self.measurements) {
                Ok(export) => response.export = Some(export),
                Err(e) => log::warn!("CSV export failed: {}", e),
            },
            ShortcutAction::DeleteSelected => {
                self.delete_selected();
            }
        }
        response
    }

    // --- internals ---

    fn begin_load(&mut self, image: String) -> PendingLoad<S> {
        self.generation += 1;
        self.loading = true;
        self.color_changed_during_load = false;
        self.image_identifier = image.clone();
        PendingLoad {
            store: self.store.clone(),
            image,
            generation: self.generation,
            calibration: self.calibration.clone(),
        }
    }

    fn ignore_while_loading(&self, what: &str) -> bool {
        if self.loading {
            log::debug!("Ignoring {} while {} is loading", what, self.image_identifier);
        }
        self.loading
    }

    fn sync_zoom(&mut self, zoom: f64) {
        if (self.overlay.metrics().zoom - zoom).abs() > f64::EPSILON {
            self.adjust_to_zoom(zoom);
        }
    }

    fn set_highlight(&mut self, selected: bool) {
        let Some(id) = self.selected else {
            return;
        };
        if let Some(measurement) = self.measurements.iter_mut().find(|m| m.id == id) {
            measurement.selected = selected;
            self.overlay.show_measurement(measurement);
        }
    }

    fn after_edit(&mut self, id: MeasurementId) {
        if let Some(measurement) = self.measurements.iter().find(|m| m.id == id) {
            self.overlay.show_measurement(measurement);
        }
        self.queue_save_all();
        self.events.push(SessionEvent::MeasurementUpdated { id });
    }

    fn queue_save_all(&mut self) {
        self.writes.push(WriteOp::SaveAll {
            image: self.image_identifier.clone(),
            measurements: self.measurements.clone(),
        });
        self.writes.push(WriteOp::SaveColor {
            color: self.measurement_color.clone(),
        });
    }

    fn queue_removal(&mut self, id: MeasurementId) {
        self.writes.push(WriteOp::Remove {
            image: self.image_identifier.clone(),
            id,
        });
        self.queue_save_all();
    }

    fn storage_warning(&mut self, message: String) {
        log::warn!("{}", message);
        self.persistence_degraded = true;
        self.events.push(SessionEvent::StorageWarning { message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::RecordingSurface;
    use crate::storage::MemoryStorage;
    use crate::viewport::Viewport;
    use pollster::block_on;

    type TestSession = Session<MemoryStorage, RecordingSurface>;

    fn um_config() -> SessionConfig {
        SessionConfig {
            conversion_factor: 2.0,
            units: "um".to_string(),
            ..SessionConfig::default()
        }
    }

    fn open(storage: &Arc<MemoryStorage>, config: SessionConfig) -> TestSession {
        block_on(Session::open(config, Arc::clone(storage), RecordingSurface::default(), "slide")).unwrap()
    }

    fn session() -> TestSession {
        open(&Arc::new(MemoryStorage::new()), um_config())
    }

    fn measure(session: &mut TestSession, p1: (f64, f64), p2: (f64, f64)) -> MeasurementId {
        assert_eq!(session.place_point(Point::new(p1.0, p1.1)), None);
        session.place_point(Point::new(p2.0, p2.1)).unwrap()
    }

    #[test]
    fn test_open_emits_data_loaded() {
        let mut session = session();
        assert!(!session.is_loading());
        assert_eq!(
            session.poll_events(),
            vec![SessionEvent::DataLoaded {
                image: "slide".to_string(),
                count: 0
            }]
        );
    }

    #[test]
    fn test_two_points_make_a_measurement() {
        let mut session = session();
        session.poll_events();

        session.place_point(Point::new(10.0, 10.0));
        assert!(session.is_measuring());
        assert!(session.overlay().has_pending());

        let id = session.place_point(Point::new(50.0, 10.0)).unwrap();
        assert!(!session.is_measuring());
        assert!(!session.overlay().has_pending());

        let m = session.measurement(id).unwrap();
        assert!((m.distance - 80.0).abs() < f64::EPSILON);
        assert_eq!(m.name, "M1");
        assert_eq!(m.image_identifier, "slide");
        assert!(session.overlay().is_shown(id));
        assert_eq!(session.poll_events(), vec![SessionEvent::MeasurementAdded { id }]);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut session = session();
        let a = measure(&mut session, (0.0, 0.0), (1.0, 0.0));
        session.undo();
        let b = measure(&mut session, (0.0, 0.0), (2.0, 0.0));
        assert!(b > a);
    }

    #[test]
    fn test_undo_pending_point_then_redo() {
        let mut session = session();
        session.place_point(Point::new(3.0, 4.0));

        assert!(session.undo());
        assert!(!session.is_measuring());
        assert_eq!(session.redo_stack().len(), 1);
        assert_eq!(session.pending_writes(), 0);

        assert!(session.redo());
        assert_eq!(session.pending_point().map(|p| p.position), Some(Point::new(3.0, 4.0)));
        assert!(session.overlay().has_pending());
    }

    #[test]
    fn test_undo_redo_keeps_original_id() {
        let mut session = session();
        let id = measure(&mut session, (10.0, 10.0), (50.0, 10.0));
        session.poll_events();

        assert!(session.undo());
        assert!(session.measurements().is_empty());
        assert!(!session.overlay().is_shown(id));
        assert_eq!(session.poll_events(), vec![SessionEvent::MeasurementRemoved { id }]);

        assert!(session.redo());
        assert_eq!(session.measurements()[0].id, id);
        assert!(session.overlay().is_shown(id));
        assert_eq!(session.poll_events(), vec![SessionEvent::MeasurementAdded { id }]);
    }

    #[test]
    fn test_delete_while_pending_then_redo() {
        let mut session = session();
        let id = measure(&mut session, (0.0, 0.0), (10.0, 10.0));
        session.select(id);
        session.place_point(Point::new(50.0, 50.0));

        assert!(session.delete_selected());
        assert!(session.is_measuring());

        // The deleted measurement comes back and the pending point stays
        assert!(session.redo());
        assert!(session.is_measuring());
        assert_eq!(session.measurements().len(), 1);
        assert!(!session.redo());
    }

    #[test]
    fn test_empty_undo_redo_are_noops() {
        let mut session = session();
        assert!(!session.undo());
        assert!(!session.redo());
        assert!(!session.can_undo());
        assert!(!session.can_redo());
    }

    #[test]
    fn test_select_and_toggle() {
        let mut session = session();
        let a = measure(&mut session, (0.0, 0.0), (10.0, 10.0));
        let b = measure(&mut session, (100.0, 100.0), (110.0, 110.0));
        session.poll_events();

        assert_eq!(session.click_at(Point::new(5.0, 5.0)), Some(a));
        assert!(session.selected().unwrap().selected);

        // Selecting another deselects the first
        assert_eq!(session.click_at(Point::new(105.0, 105.0)), Some(b));
        assert!(!session.measurement(a).unwrap().selected);

        assert_eq!(session.click_at(Point::new(105.0, 105.0)), None);
        assert!(session.selected().is_none());

        // Empty space does nothing
        assert_eq!(session.click_at(Point::new(50.0, 50.0)), None);
        assert_eq!(
            session.poll_events(),
            vec![
                SessionEvent::SelectionChanged { selected: Some(a) },
                SessionEvent::SelectionChanged { selected: Some(b) },
                SessionEvent::SelectionChanged { selected: None },
            ]
        );
    }

    #[test]
    fn test_hit_tolerance_grows_hit_box() {
        let config = SessionConfig {
            hit_tolerance: 5.0,
            ..um_config()
        };
        let mut session = open(&Arc::new(MemoryStorage::new()), config);
        let id = measure(&mut session, (0.0, 0.0), (10.0, 0.0));
        assert_eq!(session.hit_test(Point::new(5.0, 4.0)), Some(id));
        assert_eq!(session.hit_test(Point::new(5.0, 6.0)), None);
    }

    #[test]
    fn test_delete_selected_and_redo() {
        let mut session = session();
        let a = measure(&mut session, (0.0, 0.0), (10.0, 10.0));
        let b = measure(&mut session, (20.0, 20.0), (30.0, 30.0));
        session.select(a);
        session.poll_events();

        assert!(session.delete_selected());
        assert_eq!(session.measurements().iter().map(|m| m.id).collect::<Vec<_>>(), vec![b]);
        assert!(session.selected().is_none());
        assert_eq!(
            session.poll_events(),
            vec![
                SessionEvent::MeasurementRemoved { id: a },
                SessionEvent::SelectedMeasurementDeleted { id: a },
                SessionEvent::SelectionChanged { selected: None },
            ]
        );

        assert!(!session.delete_selected());

        assert!(session.redo());
        let restored = session.measurement(a).unwrap();
        assert!(!restored.selected);
    }

    #[test]
    fn test_rename_and_recolor() {
        let mut session = session();
        let id = measure(&mut session, (0.0, 0.0), (10.0, 0.0));
        session.poll_events();

        assert!(session.rename(id, "Width"));
        assert!(session.set_measurement_color(id, "#00ff00"));
        assert!(!session.rename(99, "nope"));

        let m = session.measurement(id).unwrap();
        assert_eq!(m.name, "Width");
        assert_eq!(m.p1.color, "#00ff00");
        assert_eq!(
            session.poll_events(),
            vec![
                SessionEvent::MeasurementUpdated { id },
                SessionEvent::MeasurementUpdated { id },
            ]
        );
    }

    #[test]
    fn test_set_color_recolors_pending_point() {
        let mut session = session();
        session.place_point(Point::new(0.0, 0.0));
        session.set_color("#123456");
        assert_eq!(session.pending_point().unwrap().color, "#123456");

        let id = session.place_point(Point::new(1.0, 0.0)).unwrap();
        assert_eq!(session.measurement(id).unwrap().color, "#123456");
    }

    #[test]
    fn test_color_survives_reload() {
        let storage = Arc::new(MemoryStorage::new());
        let mut session = open(&storage, um_config());
        session.set_color("#abcdef");
        block_on(session.flush());

        let session = open(&storage, um_config());
        assert_eq!(session.measurement_color(), "#abcdef");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let config = SessionConfig {
            conversion_factor: -2.0,
            ..um_config()
        };
        let result = Session::new(config, storage, RecordingSurface::default(), "slide");
        assert!(matches!(result, Err(ConfigError::InvalidConversionFactor(_))));
    }

    #[test]
    fn test_input_ignored_while_loading() {
        let storage = Arc::new(MemoryStorage::new());
        let (mut session, load) = Session::new(um_config(), storage, RecordingSurface::default(), "slide").unwrap();
        assert!(session.is_loading());
        assert_eq!(session.place_point(Point::new(0.0, 0.0)), None);
        assert!(!session.is_measuring());
        assert!(!session.reset());

        assert!(session.apply_load(block_on(load.fetch())));
        session.place_point(Point::new(0.0, 0.0));
        assert!(session.is_measuring());
    }

    #[test]
    fn test_id_counter_resumes_after_load() {
        let storage = Arc::new(MemoryStorage::new());
        let mut session = open(&storage, um_config());
        measure(&mut session, (0.0, 0.0), (1.0, 0.0));
        let last = measure(&mut session, (0.0, 0.0), (2.0, 0.0));
        block_on(session.flush());

        let mut reopened = open(&storage, um_config());
        let next = measure(&mut reopened, (0.0, 0.0), (3.0, 0.0));
        assert_eq!(next, last + 1);
        assert_eq!(reopened.measurement(next).unwrap().name, "M3");
    }

    #[test]
    fn test_adjust_to_zoom_ignores_invalid_ratio() {
        let mut session = session();
        session.adjust_to_zoom(2.0);
        session.adjust_to_zoom(0.0);
        session.adjust_to_zoom(f64::INFINITY);
        assert!((session.overlay().metrics().zoom - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_viewer_double_click() {
        let mut session = session();
        let viewport = Viewport::with_zoom(2.0);

        let response = session.handle_viewer_event(
            ViewerEvent::DoubleClick {
                position: Point::new(20.0, 20.0),
                quick: false,
            },
            &viewport,
        );
        assert!(response.prevent_default);
        assert_eq!(session.pending_point().map(|p| p.position), Some(Point::new(10.0, 10.0)));
        assert!((session.overlay().metrics().zoom - 2.0).abs() < f64::EPSILON);

        let response = session.handle_viewer_event(
            ViewerEvent::DoubleClick {
                position: Point::new(100.0, 20.0),
                quick: true,
            },
            &viewport,
        );
        assert!(!response.prevent_default);
        assert!((session.measurements()[0].distance - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_viewer_rotate_requests_reset() {
        let mut session = session();
        let response = session.handle_viewer_event(ViewerEvent::Rotate, &Viewport::new());
        assert!(response.reset_rotation);
        assert!(response.load.is_none());
    }

    #[test]
    fn test_key_shortcuts() {
        let mut session = session();
        measure(&mut session, (0.0, 0.0), (1.0, 0.0));

        let response = session.handle_key(&KeyChord::ctrl("s"), |_| true);
        assert!(response.handled);
        let export = response.export.unwrap();
        assert_eq!(export.file_name, "measurements.csv");
        assert_eq!(export.contents.lines().count(), 2);

        session.handle_key(&KeyChord::ctrl("z"), |_| true);
        assert!(session.measurements().is_empty());
        session.handle_key(&KeyChord::ctrl("y"), |_| true);
        assert_eq!(session.measurements().len(), 1);

        let response = session.handle_key(&KeyChord::new("z", Default::default()), |_| true);
        assert!(!response.handled);
        assert_eq!(session.measurements().len(), 1);
    }

    #[test]
    fn test_reset_needs_confirmation() {
        let mut session = session();
        measure(&mut session, (0.0, 0.0), (1.0, 0.0));

        let mut asked = None;
        let response = session.handle_key(&KeyChord::ctrl("r"), |prompt| {
            asked = Some(prompt.to_string());
            false
        });
        assert!(response.handled);
        assert_eq!(asked.as_deref(), Some(RESET_PROMPT));
        assert_eq!(session.measurements().len(), 1);

        session.handle_key(&KeyChord::ctrl("r"), |_| true);
        assert!(session.measurements().is_empty());
    }

    #[test]
    fn test_flush_applies_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let mut session = open(&storage, um_config());
        measure(&mut session, (0.0, 0.0), (1.0, 0.0));
        measure(&mut session, (0.0, 0.0), (2.0, 0.0));
        session.undo();

        assert!(session.pending_writes() > 0);
        block_on(session.flush());
        assert_eq!(session.pending_writes(), 0);
        assert_eq!(storage.row_count(), 1);
        assert!(!session.persistence_degraded());
    }
}
