//! Keyboard shortcut registry and documentation.

use viewmeasure_core::ShortcutAction;
use viewmeasure_core::input::SHORTCUTS;

/// A keyboard shortcut definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortcut {
    pub key: &'static str,
    pub action: ShortcutAction,
}

impl Shortcut {
    pub fn description(&self) -> &'static str {
        self.action.description()
    }

    /// Format the shortcut for display (e.g., "Ctrl/Cmd+Z").
    pub fn format(&self) -> String {
        format!("Ctrl/Cmd+{}", self.key.to_ascii_uppercase())
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        SHORTCUTS
            .iter()
            .map(|(key, action)| Shortcut { key, action: *action })
            .collect()
    }

    /// The shortcut table as printed by `--help`.
    pub fn help_text() -> String {
        let mut text = String::from("Keyboard shortcuts:\n");
        for shortcut in Self::all() {
            text.push_str(&format!("  {:14} {}\n", shortcut.format(), shortcut.description()));
        }
        text
    }
}
