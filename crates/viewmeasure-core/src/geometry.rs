//! Measurement geometry: endpoints, distances and zoom-dependent render metrics.
//!
//! All coordinates here are image-space coordinates (the pixel grid of the
//! source image), never screen pixels.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Identifier of a measurement, unique within one image.
pub type MeasurementId = u64;

/// Base point radius at zoom 1.0 (before the 1.5 damping factor).
const POINT_RADIUS: f64 = 150.0;
/// Extra damping applied to point radii so markers stay smaller than labels.
const POINT_RADIUS_DAMPING: f64 = 1.5;
/// Line stroke width at zoom 1.0.
const STROKE_WIDTH: f64 = 50.0;
/// Label font size at zoom 1.0.
const FONT_SIZE: f64 = 300.0;
/// Horizontal gap between the rightmost endpoint and the label at zoom 1.0.
const LABEL_OFFSET: f64 = 100.0;

/// Euclidean distance between two image-space points.
pub fn distance(p1: Point, p2: Point) -> f64 {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    (dx * dx + dy * dy).sqrt()
}

/// Scale a raw image-space distance into display units.
pub fn to_display_units(raw_distance: f64, conversion_factor: f64) -> f64 {
    raw_distance * conversion_factor
}

/// Conversion from image pixels to display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Pixels * factor = display distance.
    pub conversion_factor: f64,
    /// Opaque unit label, e.g. "px" or "um".
    pub units: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            conversion_factor: 1.0,
            units: "px".to_string(),
        }
    }
}

/// One end of a measurement, or the pending first point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Position in image coordinates.
    pub position: Point,
    /// Render color (CSS color string).
    pub color: String,
}

impl Endpoint {
    pub fn new(position: Point, color: impl Into<String>) -> Self {
        Self {
            position,
            color: color.into(),
        }
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }
}

/// A completed two-point measurement.
///
/// `distance` is fixed at construction; only `name`, `color` and `selected`
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: MeasurementId,
    pub p1: Endpoint,
    pub p2: Endpoint,
    pub name: String,
    pub color: String,
    /// Distance in display units.
    pub distance: f64,
    pub units: String,
    pub image_identifier: String,
    #[serde(skip)]
    pub selected: bool,
}

impl Measurement {
    /// Build a measurement and compute its calibrated distance.
    pub fn new(
        id: MeasurementId,
        p1: Endpoint,
        p2: Endpoint,
        name: impl Into<String>,
        color: impl Into<String>,
        calibration: &Calibration,
        image_identifier: impl Into<String>,
    ) -> Self {
        let raw = distance(p1.position, p2.position);
        Self {
            id,
            p1,
            p2,
            name: name.into(),
            color: color.into(),
            distance: to_display_units(raw, calibration.conversion_factor),
            units: calibration.units.clone(),
            image_identifier: image_identifier.into(),
            selected: false,
        }
    }

    /// Raw image-space length, independent of calibration.
    pub fn pixel_length(&self) -> f64 {
        distance(self.p1.position, self.p2.position)
    }

    /// Text shown next to the measurement, e.g. `"80.000 um"`.
    pub fn label(&self) -> String {
        format!("{:.3} {}", self.distance, self.units)
    }

    /// Recolor the measurement and both of its endpoints.
    pub fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
        self.p1.color = color.to_string();
        self.p2.color = color.to_string();
    }

    /// Axis-aligned bounding box of the two endpoints, grown by `tolerance`.
    pub fn hit_box(&self, tolerance: f64) -> Rect {
        Rect::from_points(self.p1.position, self.p2.position).inflate(tolerance, tolerance)
    }

    /// Bounding-box hit test with inclusive edges.
    ///
    /// This is deliberately not a distance-to-segment test: a click anywhere
    /// in the box spanned by the endpoints counts.
    pub fn contains(&self, point: Point, tolerance: f64) -> bool {
        let b = self.hit_box(tolerance);
        point.x >= b.x0 && point.x <= b.x1 && point.y >= b.y0 && point.y <= b.y1
    }

    /// The endpoint with the larger x; ties go to `p2`.
    pub fn rightmost(&self) -> &Endpoint {
        if self.p1.x() > self.p2.x() { &self.p1 } else { &self.p2 }
    }

    /// Where the distance label is anchored at the given zoom.
    pub fn label_anchor(&self, metrics: &RenderMetrics) -> Point {
        let right = self.rightmost();
        Point::new(right.x() + metrics.label_offset, right.y())
    }
}

/// Zoom-dependent sizes that keep markers a constant size on screen.
///
/// Every value scales with `1 / zoom`. A zoom of zero or below is outside
/// the viewer contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderMetrics {
    pub zoom: f64,
    pub point_radius: f64,
    pub stroke_width: f64,
    pub font_size: f64,
    pub label_offset: f64,
}

impl RenderMetrics {
    pub fn for_zoom(zoom: f64) -> Self {
        Self {
            zoom,
            point_radius: POINT_RADIUS / (zoom * POINT_RADIUS_DAMPING),
            stroke_width: STROKE_WIDTH / zoom,
            font_size: FONT_SIZE / zoom,
            label_offset: LABEL_OFFSET / zoom,
        }
    }
}
