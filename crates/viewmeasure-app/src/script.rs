//! Replay scripts: a session configuration plus a list of user steps.
//!
//! ```json
//! {
//!   "config": { "conversion_factor": 2.0, "units": "um" },
//!   "image": "slide-1",
//!   "steps": [
//!     { "action": "double_click", "x": 10, "y": 10 },
//!     { "action": "double_click", "x": 50, "y": 10 },
//!     { "action": "key", "key": "s", "modifiers": { "ctrl": true } }
//!   ]
//! }
//! ```

use kurbo::Point;
use serde::{Deserialize, Serialize};
use viewmeasure_core::{KeyChord, MeasurementId, Modifiers, SessionConfig, ViewerEvent};
use viewmeasure_widgets::PanelAction;

use crate::ReplayError;

fn default_zoom() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

/// A replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: SessionConfig,
    /// Image shown when the script starts.
    pub image: String,
    /// Initial viewer zoom.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse and validate a script.
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let script: Script = serde_json::from_str(json)?;
        script.config.validate()?;
        if !script.zoom.is_finite() || script.zoom <= 0.0 {
            return Err(ReplayError::InvalidZoom(script.zoom));
        }
        Ok(script)
    }
}

/// One user step. Positions are screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    DoubleClick {
        x: f64,
        y: f64,
        #[serde(default)]
        quick: bool,
    },
    Click {
        x: f64,
        y: f64,
    },
    /// Set the viewer zoom.
    Zoom {
        ratio: f64,
    },
    Pan {
        dx: f64,
        dy: f64,
    },
    Rotate {
        degrees: f64,
    },
    Page {
        image: String,
    },
    Key {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
        /// Answer to the reset prompt.
        #[serde(default = "yes")]
        confirm: bool,
    },
    Color {
        color: String,
    },
    Rename {
        id: MeasurementId,
        name: String,
    },
    /// Toggle selection from the measurement list.
    Select {
        id: MeasurementId,
    },
    Undo,
    Redo,
    Reset,
    Export,
    DeleteSelected,
}

impl Step {
    /// Viewer event for pointer steps.
    pub fn viewer_event(&self) -> Option<ViewerEvent> {
        match self {
            Step::DoubleClick { x, y, quick } => Some(ViewerEvent::DoubleClick {
                position: Point::new(*x, *y),
                quick: *quick,
            }),
            Step::Click { x, y } => Some(ViewerEvent::Click {
                position: Point::new(*x, *y),
            }),
            _ => None,
        }
    }

    pub fn key_chord(&self) -> Option<KeyChord> {
        match self {
            Step::Key { key, modifiers, .. } => Some(KeyChord::new(key.clone(), *modifiers)),
            _ => None,
        }
    }

    /// Panel action for steps that come from the measurement panel.
    pub fn panel_action(&self) -> Option<PanelAction> {
        match self {
            Step::Color { color } => Some(PanelAction::SetColor(color.clone())),
            Step::Rename { id, name } => Some(PanelAction::Rename {
                id: *id,
                name: name.clone(),
            }),
            Step::Select { id } => Some(PanelAction::ToggleSelection(*id)),
            Step::Undo => Some(PanelAction::Undo),
            Step::Redo => Some(PanelAction::Redo),
            Step::Reset => Some(PanelAction::Reset),
            Step::Export => Some(PanelAction::Export),
            Step::DeleteSelected => Some(PanelAction::DeleteSelected),
            _ => None,
        }
    }
}
