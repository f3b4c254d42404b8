//! Hex color helpers and color swatches for the measurement color picker.

use egui::{Color32, CursorIcon, Rect, Sense, Stroke, Ui, vec2};

use crate::sizing;

/// Quick-pick colors shown next to the picker.
pub const PRESET_COLORS: [(&str, Color32); 6] = [
    ("Black", Color32::from_rgb(0, 0, 0)),
    ("Red", Color32::from_rgb(239, 68, 68)),
    ("Orange", Color32::from_rgb(249, 115, 22)),
    ("Green", Color32::from_rgb(34, 197, 94)),
    ("Blue", Color32::from_rgb(59, 130, 246)),
    ("White", Color32::from_rgb(255, 255, 255)),
];

/// Parse `#rgb` or `#rrggbb`. Anything else is `None`.
pub fn parse_hex_color(color: &str) -> Option<Color32> {
    let hex = color.trim().strip_prefix('#')?;
    let channel = |digits: &str, scale: u8| u8::from_str_radix(digits, 16).ok().map(|v| v * scale);
    match hex.len() {
        3 => Some(Color32::from_rgb(
            channel(hex.get(0..1)?, 17)?,
            channel(hex.get(1..2)?, 17)?,
            channel(hex.get(2..3)?, 17)?,
        )),
        6 => Some(Color32::from_rgb(
            channel(hex.get(0..2)?, 1)?,
            channel(hex.get(2..4)?, 1)?,
            channel(hex.get(4..6)?, 1)?,
        )),
        _ => None,
    }
}

/// Format as lowercase `#rrggbb`, dropping alpha.
pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

/// A clickable circular color swatch.
pub struct ColorSwatch<'a> {
    color: Color32,
    tooltip: &'a str,
    selected: bool,
}

impl<'a> ColorSwatch<'a> {
    pub fn new(color: Color32, tooltip: &'a str) -> Self {
        Self {
            color,
            tooltip,
            selected: false,
        }
    }

    /// Set whether this swatch is the current color.
    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Show the swatch and return (clicked, rect).
    pub fn show(self, ui: &mut Ui) -> (bool, Rect) {
        let (rect, response) = ui.allocate_exact_size(vec2(sizing::SWATCH, sizing::SWATCH), Sense::click());

        if ui.is_rect_visible(rect) {
            let center = rect.center();
            let radius = rect.width() / 2.0;
            ui.painter().circle_filled(center, radius, self.color);
            // Light swatches need an outline to be visible on the panel
            ui.painter()
                .circle_stroke(center, radius, Stroke::new(1.0, Color32::from_gray(210)));
            if self.selected {
                ui.painter()
                    .circle_stroke(center, radius - 3.0, Stroke::new(2.0, Color32::from_gray(30)));
            }
        }

        let clicked = response.clicked();
        response.on_hover_text(self.tooltip).on_hover_cursor(CursorIcon::PointingHand);
        (clicked, rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff8000"), Some(Color32::from_rgb(255, 128, 0)));
        assert_eq!(parse_hex_color("#f80"), Some(Color32::from_rgb(255, 136, 0)));
        assert_eq!(parse_hex_color(" #000000 "), Some(Color32::BLACK));
        assert_eq!(parse_hex_color("grey"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_hex_round_trip() {
        for hex in ["#000000", "#ff0000", "#3b82f6", "#abcdef"] {
            assert_eq!(parse_hex_color(hex).map(to_hex).as_deref(), Some(hex));
        }
    }
}
