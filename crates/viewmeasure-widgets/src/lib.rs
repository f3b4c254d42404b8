//! egui presentation shell for measurement sessions.
//!
//! - **Panel**: color picker, editable measurement list, button bar
//! - **Colors**: hex color helpers and color swatches
//! - **Buttons**: text buttons with shortcut hints
//! - **Layout**: section labels, separators, panel frame
//!
//! Widgets never touch a session directly; they return [`PanelAction`]s
//! for the host to apply.

pub mod buttons;
pub mod colors;
pub mod layout;
pub mod panel;

pub use buttons::BarButton;
pub use colors::{ColorSwatch, PRESET_COLORS, parse_hex_color, to_hex};
pub use layout::{panel_frame, section_label, separator};
pub use panel::{MeasurementPanel, PanelAction, PanelState, PanelView};

/// Standard sizing constants used across widgets.
pub mod sizing {
    /// Color swatch size
    pub const SWATCH: f32 = 18.0;
    /// Button bar button height
    pub const BUTTON_HEIGHT: f32 = 24.0;
    /// Width of the name column in the measurement list
    pub const NAME_WIDTH: f32 = 90.0;
    /// Standard corner radius
    pub const CORNER_RADIUS: u8 = 4;
    /// Panel corner radius
    pub const PANEL_RADIUS: u8 = 8;
}

/// Standard colors used across widgets.
pub mod theme {
    use egui::Color32;

    /// Text color (dark gray)
    pub const TEXT: Color32 = Color32::from_rgb(60, 60, 60);
    /// Muted text color
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(120, 120, 120);
    /// Disabled text color
    pub const TEXT_DISABLED: Color32 = Color32::from_rgb(180, 180, 180);
    /// Border color
    pub const BORDER: Color32 = Color32::from_rgb(220, 220, 220);
    /// Hover background
    pub const HOVER_BG: Color32 = Color32::from_rgb(245, 245, 245);
    /// Background of the armed reset button
    pub const DANGER_BG: Color32 = Color32::from_rgb(254, 226, 226);
    /// Panel background
    pub const PANEL_BG: Color32 = Color32::from_rgba_premultiplied(250, 250, 252, 250);
}
