//! Glue between the measurement panel and a session.

use viewmeasure_core::{CsvExport, DrawSurface, Session, Storage, build_export};
use viewmeasure_widgets::{PanelAction, PanelView};

/// Snapshot the session for the panel.
pub fn panel_view<S: Storage, D: DrawSurface>(session: &Session<S, D>) -> PanelView<'_> {
    PanelView {
        measurements: session.measurements(),
        color: session.measurement_color(),
        can_undo: session.can_undo(),
        can_redo: session.can_redo(),
        has_selection: session.selected().is_some(),
        loading: session.is_loading(),
    }
}

/// Apply a panel action to the session.
///
/// Returns the CSV when the action was an export.
pub fn apply_panel_action<S: Storage, D: DrawSurface>(
    session: &mut Session<S, D>,
    action: PanelAction,
) -> Option<CsvExport> {
    log::debug!("Panel action {:?}", action);
    match action {
        PanelAction::SetColor(color) => session.set_color(color),
        PanelAction::Rename { id, name } => {
            session.rename(id, name);
        }
        PanelAction::ToggleSelection(id) => {
            if session.selected().is_some_and(|m| m.id == id) {
                session.deselect();
            } else {
                session.select(id);
            }
        }
        PanelAction::Undo => {
            session.undo();
        }
        PanelAction::Redo => {
            session.redo();
        }
        PanelAction::Reset => {
            session.reset();
        }
        PanelAction::Export => match build_export(session.measurements()) {
            Ok(export) => return Some(export),
            Err(e) => log::warn!("CSV export failed: {}", e),
        },
        PanelAction::DeleteSelected => {
            session.delete_selected();
        }
    }
    None
}
