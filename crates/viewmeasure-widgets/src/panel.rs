//! The measurement panel: color picker, measurement list and button bar.

use std::collections::HashMap;

use egui::{Color32, RichText, Ui};
use viewmeasure_core::{Measurement, MeasurementId};

use crate::buttons::BarButton;
use crate::colors::{ColorSwatch, PRESET_COLORS, parse_hex_color, to_hex};
use crate::layout::{panel_frame, section_label, separator};
use crate::{sizing, theme};

/// Something the user asked for through the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    SetColor(String),
    Rename { id: MeasurementId, name: String },
    /// Select the measurement, or deselect it if it already is.
    ToggleSelection(MeasurementId),
    Undo,
    Redo,
    /// Confirmed reset.
    Reset,
    Export,
    DeleteSelected,
}

/// Read-only session snapshot the panel draws from.
pub struct PanelView<'a> {
    pub measurements: &'a [Measurement],
    pub color: &'a str,
    pub can_undo: bool,
    pub can_redo: bool,
    pub has_selection: bool,
    /// Input is ignored while an image loads.
    pub loading: bool,
}

impl<'a> PanelView<'a> {
    pub fn new(measurements: &'a [Measurement], color: &'a str) -> Self {
        Self {
            measurements,
            color,
            can_undo: !measurements.is_empty(),
            can_redo: false,
            has_selection: measurements.iter().any(|m| m.selected),
            loading: false,
        }
    }
}

/// Panel state that lives across frames.
#[derive(Debug, Default)]
pub struct PanelState {
    /// Name drafts, keyed by measurement id.
    name_edits: HashMap<MeasurementId, String>,
    /// Reset was clicked once and waits for confirmation.
    reset_armed: bool,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_armed(&self) -> bool {
        self.reset_armed
    }

    /// First call arms the reset, the second confirms it.
    pub fn request_reset(&mut self) -> Option<PanelAction> {
        if self.reset_armed {
            self.reset_armed = false;
            Some(PanelAction::Reset)
        } else {
            self.reset_armed = true;
            None
        }
    }

    pub fn cancel_reset(&mut self) {
        self.reset_armed = false;
    }

    /// Draft name for a measurement, seeded from its current name.
    pub fn name_draft(&mut self, measurement: &Measurement) -> &mut String {
        self.name_edits
            .entry(measurement.id)
            .or_insert_with(|| measurement.name.clone())
    }

    /// Turn a finished edit into a rename, or restore the draft if it is
    /// empty or unchanged.
    pub fn commit_name(&mut self, measurement: &Measurement) -> Option<PanelAction> {
        let draft = self.name_edits.remove(&measurement.id)?;
        let name = draft.trim();
        if name.is_empty() || name == measurement.name {
            return None;
        }
        Some(PanelAction::Rename {
            id: measurement.id,
            name: name.to_string(),
        })
    }

    /// Drop drafts of measurements that are gone.
    pub fn retain(&mut self, measurements: &[Measurement]) {
        self.name_edits
            .retain(|id, _| measurements.iter().any(|m| m.id == *id));
    }
}

/// The measurement panel widget.
pub struct MeasurementPanel;

impl MeasurementPanel {
    /// Show the panel and return at most one action for this frame.
    pub fn show(ui: &mut Ui, view: &PanelView<'_>, state: &mut PanelState) -> Option<PanelAction> {
        let mut action = None;
        state.retain(view.measurements);

        ui.add_enabled_ui(!view.loading, |ui| {
            section_label(ui, "Color");
            if let Some(a) = Self::color_row(ui, view.color) {
                action = Some(a);
            }
            separator(ui);

            section_label(ui, "Measurements");
            if let Some(a) = Self::measurement_list(ui, view.measurements, state) {
                action = Some(a);
            }
            separator(ui);

            if let Some(a) = Self::button_bar(ui, view, state) {
                action = Some(a);
            }
        });

        if view.loading {
            ui.label(RichText::new("Loading...").size(11.0).color(theme::TEXT_MUTED));
        }
        action
    }

    /// [`MeasurementPanel::show`] inside the standard panel frame.
    pub fn show_framed(ui: &mut Ui, view: &PanelView<'_>, state: &mut PanelState) -> Option<PanelAction> {
        panel_frame().show(ui, |ui| Self::show(ui, view, state)).inner
    }

    fn color_row(ui: &mut Ui, current: &str) -> Option<PanelAction> {
        let mut action = None;
        let current_color = parse_hex_color(current).unwrap_or(Color32::BLACK);

        ui.horizontal(|ui| {
            let mut picked = current_color;
            if ui.color_edit_button_srgba(&mut picked).changed() && picked != current_color {
                action = Some(PanelAction::SetColor(to_hex(picked)));
            }
            for (name, color) in PRESET_COLORS {
                let (clicked, _) = ColorSwatch::new(color, name)
                    .selected(color == current_color)
                    .show(ui);
                if clicked && color != current_color {
                    action = Some(PanelAction::SetColor(to_hex(color)));
                }
            }
        });
        action
    }

    fn measurement_list(ui: &mut Ui, measurements: &[Measurement], state: &mut PanelState) -> Option<PanelAction> {
        if measurements.is_empty() {
            ui.label(
                RichText::new("Double-click the image twice to measure")
                    .size(11.0)
                    .color(theme::TEXT_MUTED),
            );
            return None;
        }

        let mut action = None;
        egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
            for measurement in measurements {
                ui.horizontal(|ui| {
                    let swatch = parse_hex_color(&measurement.color).unwrap_or(theme::TEXT);
                    ColorSwatch::new(swatch, &measurement.color).show(ui);

                    let edit = egui::TextEdit::singleline(state.name_draft(measurement))
                        .desired_width(sizing::NAME_WIDTH);
                    let response = ui.add(edit);
                    if response.lost_focus() {
                        if let Some(a) = state.commit_name(measurement) {
                            action = Some(a);
                        }
                    }

                    if ui
                        .selectable_label(measurement.selected, measurement.label())
                        .clicked()
                    {
                        action = Some(PanelAction::ToggleSelection(measurement.id));
                    }
                });
            }
        });
        action
    }

    fn button_bar(ui: &mut Ui, view: &PanelView<'_>, state: &mut PanelState) -> Option<PanelAction> {
        let mut action = None;
        ui.horizontal_wrapped(|ui| {
            if BarButton::new("Undo").shortcut("Ctrl+Z").enabled(view.can_undo).show(ui) {
                state.cancel_reset();
                action = Some(PanelAction::Undo);
            }
            if BarButton::new("Redo").shortcut("Ctrl+Y").enabled(view.can_redo).show(ui) {
                state.cancel_reset();
                action = Some(PanelAction::Redo);
            }
            let reset_label = if state.reset_armed() { "Confirm reset" } else { "Reset" };
            if BarButton::new(reset_label)
                .shortcut("Ctrl+R")
                .danger(state.reset_armed())
                .show(ui)
            {
                action = state.request_reset();
            }
            if BarButton::new("Export CSV").shortcut("Ctrl+S").show(ui) {
                state.cancel_reset();
                action = Some(PanelAction::Export);
            }
            if BarButton::new("Delete selected")
                .shortcut("Ctrl+D")
                .enabled(view.has_selection)
                .show(ui)
            {
                state.cancel_reset();
                action = Some(PanelAction::DeleteSelected);
            }
        });
        action
    }
}
