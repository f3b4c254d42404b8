//! Button bar buttons.

use egui::{Color32, CornerRadius, CursorIcon, Pos2, Sense, Stroke, StrokeKind, Ui, vec2};

use crate::{sizing, theme};

/// A text button with an optional shortcut hint, e.g. "Undo  Ctrl+Z".
pub struct BarButton<'a> {
    label: &'a str,
    shortcut: Option<&'a str>,
    enabled: bool,
    danger: bool,
}

impl<'a> BarButton<'a> {
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            shortcut: None,
            enabled: true,
            danger: false,
        }
    }

    /// Add a shortcut hint.
    pub fn shortcut(mut self, shortcut: &'a str) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Highlight the button as a pending destructive action.
    pub fn danger(mut self, danger: bool) -> Self {
        self.danger = danger;
        self
    }

    /// Show the button and return true if clicked while enabled.
    pub fn show(self, ui: &mut Ui) -> bool {
        let font = egui::FontId::proportional(12.0);
        let hint_font = egui::FontId::proportional(11.0);
        let label_width = ui
            .painter()
            .layout_no_wrap(self.label.to_string(), font.clone(), theme::TEXT)
            .size()
            .x;
        let hint_width = self.shortcut.map_or(0.0, |s| {
            ui.painter()
                .layout_no_wrap(s.to_string(), hint_font.clone(), theme::TEXT_MUTED)
                .size()
                .x
                + 8.0
        });
        let size = vec2(label_width + hint_width + 16.0, sizing::BUTTON_HEIGHT);
        let (rect, response) = ui.allocate_exact_size(size, Sense::click());

        if ui.is_rect_visible(rect) {
            let bg_color = if self.danger {
                theme::DANGER_BG
            } else if self.enabled && response.hovered() {
                theme::HOVER_BG
            } else {
                Color32::TRANSPARENT
            };
            let radius = CornerRadius::same(sizing::CORNER_RADIUS);
            ui.painter().rect_filled(rect, radius, bg_color);
            ui.painter()
                .rect_stroke(rect, radius, Stroke::new(1.0, theme::BORDER), StrokeKind::Inside);

            let text_color = if self.enabled { theme::TEXT } else { theme::TEXT_DISABLED };
            ui.painter().text(
                Pos2::new(rect.left() + 8.0, rect.center().y),
                egui::Align2::LEFT_CENTER,
                self.label,
                font,
                text_color,
            );

            if let Some(shortcut) = self.shortcut {
                ui.painter().text(
                    Pos2::new(rect.right() - 8.0, rect.center().y),
                    egui::Align2::RIGHT_CENTER,
                    shortcut,
                    hint_font,
                    theme::TEXT_MUTED,
                );
            }
        }

        let clicked = response.clicked();
        if self.enabled {
            response.on_hover_cursor(CursorIcon::PointingHand);
        }
        self.enabled && clicked
    }
}
