//! Rendering adapter between measurements and an abstract drawing surface.
//!
//! The overlay owns no business state. It remembers which surface
//! primitives belong to which measurement so it can restyle or remove them,
//! and derives every size from the current zoom.

use crate::geometry::{Endpoint, Measurement, MeasurementId, RenderMetrics};
use kurbo::Point;
use std::collections::HashMap;

/// Color used for every primitive of the selected measurement.
pub const HIGHLIGHT_COLOR: &str = "#808080";

/// Handle to a primitive living on a [`DrawSurface`].
pub type PrimitiveId = u64;

/// A drawable item positioned in image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Circle {
        center: Point,
        radius: f64,
        fill: String,
    },
    Line {
        from: Point,
        to: Point,
        stroke: String,
        width: f64,
    },
    Text {
        anchor: Point,
        content: String,
        font_size: f64,
        fill: String,
    },
}

/// A retained-mode canvas laid over the image.
pub trait DrawSurface {
    /// Add a primitive on top of everything drawn so far.
    fn add(&mut self, primitive: Primitive) -> PrimitiveId;
    /// Replace a primitive in place, keeping its stacking position.
    fn update(&mut self, id: PrimitiveId, primitive: Primitive);
    fn remove(&mut self, id: PrimitiveId);
    fn clear(&mut self);
}

/// Surface handles of one rendered measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeasurementHandles {
    p1: PrimitiveId,
    p2: PrimitiveId,
    line: PrimitiveId,
    label: PrimitiveId,
}

/// Draws measurements and the pending point onto a [`DrawSurface`].
pub struct Overlay<D: DrawSurface> {
    surface: D,
    metrics: RenderMetrics,
    measurements: HashMap<MeasurementId, MeasurementHandles>,
    pending: Option<PrimitiveId>,
}

impl<D: DrawSurface> Overlay<D> {
    pub fn new(surface: D, zoom: f64) -> Self {
        Self {
            surface,
            metrics: RenderMetrics::for_zoom(zoom),
            measurements: HashMap::new(),
            pending: None,
        }
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut D {
        &mut self.surface
    }

    pub fn metrics(&self) -> RenderMetrics {
        self.metrics
    }

    /// Check if a measurement currently has primitives on the surface.
    pub fn is_shown(&self, id: MeasurementId) -> bool {
        self.measurements.contains_key(&id)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of measurements currently drawn.
    pub fn shown_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn show_pending(&mut self, point: &Endpoint) {
        let primitive = self.point_primitive(point.position, &point.color);
        match self.pending {
            Some(id) => self.surface.update(id, primitive),
            None => self.pending = Some(self.surface.add(primitive)),
        }
    }

    /// Restyle the pending point in place.
    pub fn recolor_pending(&mut self, point: &Endpoint) {
        if let Some(id) = self.pending {
            let primitive = self.point_primitive(point.position, &point.color);
            self.surface.update(id, primitive);
        }
    }

    pub fn hide_pending(&mut self) {
        if let Some(id) = self.pending.take() {
            self.surface.remove(id);
        }
    }

    /// Draw a measurement, or redraw it if it is already shown.
    pub fn show_measurement(&mut self, measurement: &Measurement) {
        let [p1, p2, line, label] = self.measurement_primitives(measurement);
        if let Some(handles) = self.measurements.get(&measurement.id).copied() {
            self.surface.update(handles.p1, p1);
            self.surface.update(handles.p2, p2);
            self.surface.update(handles.line, line);
            self.surface.update(handles.label, label);
            return;
        }
        // Line first so the endpoints sit on top of it
        let line = self.surface.add(line);
        let p1 = self.surface.add(p1);
        let p2 = self.surface.add(p2);
        let label = self.surface.add(label);
        self.measurements
            .insert(measurement.id, MeasurementHandles { p1, p2, line, label });
    }

    pub fn hide_measurement(&mut self, id: MeasurementId) {
        if let Some(handles) = self.measurements.remove(&id) {
            self.surface.remove(handles.label);
            self.surface.remove(handles.p2);
            self.surface.remove(handles.p1);
            self.surface.remove(handles.line);
        }
    }

    /// Re-derive every size for a new zoom ratio and redraw in place.
    pub fn adjust_to_zoom(&mut self, zoom: f64, measurements: &[Measurement], pending: Option<&Endpoint>) {
        self.metrics = RenderMetrics::for_zoom(zoom);
        for measurement in measurements {
            if self.is_shown(measurement.id) {
                self.show_measurement(measurement);
            }
        }
        if let Some(point) = pending {
            self.recolor_pending(point);
        }
    }

    /// Remove every primitive from the surface.
    pub fn clear(&mut self) {
        self.measurements.clear();
        self.pending = None;
        self.surface.clear();
    }

    fn point_primitive(&self, center: Point, color: &str) -> Primitive {
        Primitive::Circle {
            center,
            radius: self.metrics.point_radius,
            fill: color.to_string(),
        }
    }

    fn measurement_primitives(&self, measurement: &Measurement) -> [Primitive; 4] {
        let (p1_color, p2_color, color) = if measurement.selected {
            (HIGHLIGHT_COLOR, HIGHLIGHT_COLOR, HIGHLIGHT_COLOR)
        } else {
            (
                measurement.p1.color.as_str(),
                measurement.p2.color.as_str(),
                measurement.color.as_str(),
            )
        };
        [
            self.point_primitive(measurement.p1.position, p1_color),
            self.point_primitive(measurement.p2.position, p2_color),
            Primitive::Line {
                from: measurement.p1.position,
                to: measurement.p2.position,
                stroke: color.to_string(),
                width: self.metrics.stroke_width,
            },
            Primitive::Text {
                anchor: measurement.label_anchor(&self.metrics),
                content: measurement.label(),
                font_size: self.metrics.font_size,
                fill: color.to_string(),
            },
        ]
    }
}

/// Surface that records primitives in a map, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSurface {
    next_id: PrimitiveId,
    pub(crate) items: std::collections::BTreeMap<PrimitiveId, Primitive>,
}

#[cfg(test)]
impl DrawSurface for RecordingSurface {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, primitive);
        id
    }

    fn update(&mut self, id: PrimitiveId, primitive: Primitive) {
        if let Some(slot) = self.items.get_mut(&id) {
            *slot = primitive;
        }
    }

    fn remove(&mut self, id: PrimitiveId) {
        self.items.remove(&id);
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}
