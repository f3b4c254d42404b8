//! Input contracts between the session and its host viewer.
//!
//! The viewer owns pan/zoom/rotation and raw pointer handling; it reports
//! high level events here and answers zoom and coordinate queries through
//! [`Viewer`].

use crate::export::CsvExport;
use crate::session::PendingLoad;
use crate::storage::Storage;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Queries the session makes against the host viewer.
pub trait Viewer {
    /// Current zoom ratio; always positive.
    fn zoom(&self) -> f64;
    /// Convert a screen position into image coordinates.
    fn screen_to_image(&self, screen: Point) -> Point;
}

/// Viewer events the session reacts to. Positions are screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerEvent {
    DoubleClick {
        position: Point,
        /// The viewer already treated this as a quick zoom gesture.
        #[serde(default)]
        quick: bool,
    },
    Click {
        position: Point,
    },
    Zoom {
        ratio: f64,
    },
    Rotate,
    PageChanged {
        image_identifier: String,
    },
}

/// What the viewer should do after an event was handled.
pub struct ViewerResponse<S: Storage> {
    /// Suppress the viewer's default action (zoom on double click).
    pub prevent_default: bool,
    /// Snap the viewer's rotation back to 0.
    pub reset_rotation: bool,
    /// A page change started a load the host must drive.
    pub load: Option<PendingLoad<S>>,
}

impl<S: Storage> Default for ViewerResponse<S> {
    fn default() -> Self {
        Self {
            prevent_default: false,
            reset_rotation: false,
            load: None,
        }
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A key press together with the modifiers held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: String,
    #[serde(flatten)]
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    /// Chord with the command modifier held.
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self::new(
            key,
            Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        )
    }
}

/// Keyboard shortcut actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShortcutAction {
    Reset,
    Undo,
    Redo,
    Export,
    DeleteSelected,
}

/// Every shortcut with its key. All of them need the command modifier.
pub const SHORTCUTS: [(&str, ShortcutAction); 5] = [
    ("r", ShortcutAction::Reset),
    ("z", ShortcutAction::Undo),
    ("y", ShortcutAction::Redo),
    ("s", ShortcutAction::Export),
    ("d", ShortcutAction::DeleteSelected),
];

impl ShortcutAction {
    /// Map a chord to an action; chords without Ctrl/Cmd never match.
    pub fn from_chord(chord: &KeyChord) -> Option<Self> {
        if !chord.modifiers.command() {
            return None;
        }
        SHORTCUTS
            .iter()
            .find(|(key, _)| chord.key.eq_ignore_ascii_case(key))
            .map(|(_, action)| *action)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ShortcutAction::Reset => "Reset all measurements",
            ShortcutAction::Undo => "Undo",
            ShortcutAction::Redo => "Redo",
            ShortcutAction::Export => "Export measurements as CSV",
            ShortcutAction::DeleteSelected => "Delete selected measurement",
        }
    }
}

/// Result of a key press.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyResponse {
    /// The chord was a shortcut; the host should suppress its default.
    pub handled: bool,
    /// CSV produced by the export shortcut.
    pub export: Option<CsvExport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts_need_command_modifier() {
        assert_eq!(ShortcutAction::from_chord(&KeyChord::new("z", Modifiers::default())), None);

        let shift_only = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        assert_eq!(ShortcutAction::from_chord(&KeyChord::new("z", shift_only)), None);
    }

    #[test]
    fn test_shortcut_mapping() {
        assert_eq!(ShortcutAction::from_chord(&KeyChord::ctrl("r")), Some(ShortcutAction::Reset));
        assert_eq!(ShortcutAction::from_chord(&KeyChord::ctrl("Z")), Some(ShortcutAction::Undo));
        assert_eq!(ShortcutAction::from_chord(&KeyChord::ctrl("y")), Some(ShortcutAction::Redo));
        assert_eq!(ShortcutAction::from_chord(&KeyChord::ctrl("s")), Some(ShortcutAction::Export));
        assert_eq!(
            ShortcutAction::from_chord(&KeyChord::ctrl("d")),
            Some(ShortcutAction::DeleteSelected)
        );
        assert_eq!(ShortcutAction::from_chord(&KeyChord::ctrl("q")), None);
    }

    #[test]
    fn test_meta_counts_as_command() {
        let cmd = Modifiers {
            meta: true,
            ..Modifiers::default()
        };
        assert_eq!(ShortcutAction::from_chord(&KeyChord::new("y", cmd)), Some(ShortcutAction::Redo));
    }

    #[test]
    fn test_key_chord_json() {
        let chord: KeyChord = serde_json::from_str(r#"{"key": "z", "ctrl": true}"#).unwrap();
        assert_eq!(chord, KeyChord::ctrl("z"));
    }

    #[test]
    fn test_viewer_event_json() {
        let event: ViewerEvent =
            serde_json::from_str(r#"{"type": "double_click", "position": {"x": 1.0, "y": 2.0}}"#).unwrap();
        assert_eq!(
            event,
            ViewerEvent::DoubleClick {
                position: Point::new(1.0, 2.0),
                quick: false
            }
        );
    }
}
