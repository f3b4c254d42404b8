//! Drives a session from a script, the way a viewer host would.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use kurbo::Vec2;
use pollster::block_on;
use thiserror::Error;
use viewmeasure_core::{
    ConfigError, CsvExport, Session, SessionEvent, Storage, StorageError, ViewerEvent, Viewport,
};
use viewmeasure_render::SceneSurface;

use crate::script::{Script, Step};
use crate::ui::apply_panel_action;

/// Replay errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Zoom must be finite and positive, got {0}")]
    InvalidZoom(f64),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A session wired to a scene surface and a reference viewport.
pub struct Replay<S: Storage> {
    session: Session<S, SceneSurface>,
    viewport: Viewport,
    /// Where exports are written; `None` keeps them in memory only.
    output: Option<PathBuf>,
    exports: Vec<CsvExport>,
    events: Vec<SessionEvent>,
}

impl<S: Storage> Replay<S> {
    /// Open a session for the script's initial image and zoom.
    pub fn start(script: &Script, storage: Arc<S>) -> Result<Self, ReplayError> {
        let viewport = Viewport::with_zoom(script.zoom);
        let mut session = block_on(Session::open(
            script.config.clone(),
            storage,
            SceneSurface::new(),
            script.image.clone(),
        ))?;
        session.adjust_to_zoom(viewport.zoom);

        let mut replay = Self {
            session,
            viewport,
            output: None,
            exports: Vec::new(),
            events: Vec::new(),
        };
        replay.drain_events();
        Ok(replay)
    }

    /// Write every export to `path`.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn session(&self) -> &Session<S, SceneSurface> {
        &self.session
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Every session event seen so far, in order.
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn exports(&self) -> &[CsvExport] {
        &self.exports
    }

    /// Run all steps of a script.
    pub fn run(&mut self, script: &Script) -> Result<(), ReplayError> {
        for (index, step) in script.steps.iter().enumerate() {
            log::debug!("Step {}: {:?}", index, step);
            self.step(step)?;
        }
        Ok(())
    }

    /// Apply one step, then flush writes and collect events.
    pub fn step(&mut self, step: &Step) -> Result<(), ReplayError> {
        match step {
            Step::DoubleClick { .. } | Step::Click { .. } => {
                if let Some(event) = step.viewer_event() {
                    let response = self.session.handle_viewer_event(event, &self.viewport);
                    if response.prevent_default {
                        log::trace!("Viewer default action suppressed");
                    }
                }
            }
            Step::Zoom { ratio } => {
                self.viewport.set_zoom(*ratio);
                self.session.handle_viewer_event(
                    ViewerEvent::Zoom {
                        ratio: self.viewport.zoom,
                    },
                    &self.viewport,
                );
            }
            Step::Pan { dx, dy } => self.viewport.pan(Vec2::new(*dx, *dy)),
            Step::Rotate { degrees } => {
                self.viewport.rotate(*degrees);
                let response = self.session.handle_viewer_event(ViewerEvent::Rotate, &self.viewport);
                if response.reset_rotation {
                    self.viewport.reset_rotation();
                }
            }
            Step::Page { image } => {
                // Writes for the old image land before the new one is read
                block_on(self.session.flush());
                let response = self.session.handle_viewer_event(
                    ViewerEvent::PageChanged {
                        image_identifier: image.clone(),
                    },
                    &self.viewport,
                );
                if let Some(load) = response.load {
                    let loaded = block_on(load.fetch());
                    self.session.apply_load(loaded);
                }
            }
            Step::Key { confirm, .. } => {
                if let Some(chord) = step.key_chord() {
                    let response = self.session.handle_key(&chord, |prompt| {
                        log::info!("{} {}", prompt, if *confirm { "yes" } else { "no" });
                        *confirm
                    });
                    if let Some(export) = response.export {
                        self.save_export(export)?;
                    }
                }
            }
            _ => {
                if let Some(action) = step.panel_action() {
                    if let Some(export) = apply_panel_action(&mut self.session, action) {
                        self.save_export(export)?;
                    }
                }
            }
        }

        block_on(self.session.flush());
        self.drain_events();
        Ok(())
    }

    fn save_export(&mut self, export: CsvExport) -> Result<(), ReplayError> {
        if let Some(path) = &self.output {
            fs::write(path, &export.contents).map_err(|source| ReplayError::Write {
                path: path.clone(),
                source,
            })?;
            log::info!("Wrote {} measurements to {}", self.session.measurements().len(), path.display());
        }
        self.exports.push(export);
        Ok(())
    }

    fn drain_events(&mut self) {
        for event in self.session.poll_events() {
            match &event {
                SessionEvent::StorageWarning { message } => log::warn!("{}: {}", event.name(), message),
                _ => log::info!("{}: {:?}", event.name(), event),
            }
            self.events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewmeasure_core::MemoryStorage;

    fn script(json: &str) -> Script {
        Script::from_json(json).unwrap()
    }

    fn replay(json: &str) -> Replay<MemoryStorage> {
        let script = script(json);
        let mut replay = Replay::start(&script, Arc::new(MemoryStorage::new())).unwrap();
        replay.run(&script).unwrap();
        replay
    }

    #[test]
    fn test_measure_and_export() {
        let replay = replay(
            r#"{
                "config": { "conversion_factor": 2.0, "units": "um" },
                "image": "slide",
                "steps": [
                    { "action": "double_click", "x": 10, "y": 10 },
                    { "action": "double_click", "x": 50, "y": 10 },
                    { "action": "key", "key": "s", "modifiers": { "ctrl": true } }
                ]
            }"#,
        );

        assert_eq!(replay.session().measurements()[0].label(), "80.000 um");
        assert_eq!(
            replay.exports()[0].contents,
            "Name,Point1X,Point1Y,Point2X,Point2Y,Distance\nM1,10,10,50,10,80\n"
        );
        assert!(replay.events().contains(&SessionEvent::MeasurementAdded { id: 0 }));
    }

    #[test]
    fn test_zoomed_clicks_map_to_image_space() {
        let replay = replay(
            r#"{
                "image": "slide",
                "zoom": 2.0,
                "steps": [
                    { "action": "double_click", "x": 20, "y": 20 },
                    { "action": "double_click", "x": 120, "y": 20 }
                ]
            }"#,
        );
        let m = &replay.session().measurements()[0];
        assert_eq!(m.distance, 50.0);
        assert_eq!(replay.session().overlay().metrics().zoom, 2.0);
    }

    #[test]
    fn test_rotation_snaps_back() {
        let replay = replay(r#"{ "image": "slide", "steps": [ { "action": "rotate", "degrees": 90 } ] }"#);
        assert_eq!(replay.viewport().rotation, 0.0);
    }

    #[test]
    fn test_declined_reset_keeps_measurements() {
        let replay = replay(
            r#"{
                "image": "slide",
                "steps": [
                    { "action": "double_click", "x": 0, "y": 0 },
                    { "action": "double_click", "x": 5, "y": 0 },
                    { "action": "key", "key": "r", "modifiers": { "meta": true }, "confirm": false }
                ]
            }"#,
        );
        assert_eq!(replay.session().measurements().len(), 1);
        assert!(!replay.events().contains(&SessionEvent::MeasurementsReset));
    }

    #[test]
    fn test_panel_steps() {
        let replay = replay(
            r#"{
                "image": "slide",
                "steps": [
                    { "action": "double_click", "x": 0, "y": 0 },
                    { "action": "double_click", "x": 10, "y": 10 },
                    { "action": "rename", "id": 0, "name": "Diagonal" },
                    { "action": "select", "id": 0 },
                    { "action": "delete_selected" },
                    { "action": "redo" }
                ]
            }"#,
        );
        let session = replay.session();
        assert_eq!(session.measurements().len(), 1);
        assert_eq!(session.measurements()[0].name, "Diagonal");
        assert!(replay.events().contains(&SessionEvent::SelectedMeasurementDeleted { id: 0 }));
        assert!(replay.events().contains(&SessionEvent::MeasurementRemoved { id: 0 }));
    }

    #[test]
    fn test_page_round_trip_restores_measurements() {
        let replay = replay(
            r##"{
                "image": "a",
                "steps": [
                    { "action": "color", "color": "#ff0000" },
                    { "action": "double_click", "x": 0, "y": 0 },
                    { "action": "double_click", "x": 3, "y": 4 },
                    { "action": "page", "image": "b" },
                    { "action": "page", "image": "a" }
                ]
            }"##,
        );
        let session = replay.session();
        assert_eq!(session.image_identifier(), "a");
        assert_eq!(session.measurements().len(), 1);
        assert_eq!(session.measurements()[0].color, "#ff0000");
        assert_eq!(session.measurement_color(), "#ff0000");
        assert!(replay.events().contains(&SessionEvent::DataLoaded {
            image: "a".to_string(),
            count: 1
        }));
    }

    #[test]
    fn test_export_written_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        let script = script(
            r#"{ "image": "slide", "steps": [ { "action": "export" } ] }"#,
        );
        let mut replay = Replay::start(&script, Arc::new(MemoryStorage::new())).unwrap().with_output(&out);
        replay.run(&script).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written, "Name,Point1X,Point1Y,Point2X,Point2Y,Distance\n");
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing").join("out.csv");
        let script = script(r#"{ "image": "slide", "steps": [ { "action": "export" } ] }"#);
        let mut replay = Replay::start(&script, Arc::new(MemoryStorage::new())).unwrap().with_output(&out);
        assert!(matches!(replay.run(&script), Err(ReplayError::Write { .. })));
    }
}
