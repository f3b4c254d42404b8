//! Viewport module for pan/zoom transforms over the image.

use crate::input::Viewer;
use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Viewport manages the view transform of the image.
///
/// It handles panning (translation), zooming (scaling) and rotation,
/// converting between screen coordinates and image coordinates. This is the
/// reference [`Viewer`] used by the replay shell and by tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Current translation offset (pan)
    pub offset: Vec2,
    /// Current zoom ratio (screen pixels per image pixel)
    pub zoom: f64,
    /// Rotation in degrees, applied around the image origin
    pub rotation: f64,
    /// Minimum allowed zoom level
    pub min_zoom: f64,
    /// Maximum allowed zoom level
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            min_zoom: 0.01,
            max_zoom: 64.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zoom(zoom: f64) -> Self {
        let mut viewport = Self::default();
        viewport.set_zoom(zoom);
        viewport
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts image coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.zoom)
    }

    /// Convert a screen point to image coordinates.
    pub fn screen_to_image(&self, screen_point: Point) -> Point {
        self.transform().inverse() * screen_point
    }

    pub fn image_to_screen(&self, image_point: Point) -> Point {
        self.transform() * image_point
    }

    /// Pan the viewport by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Set the zoom ratio, clamped to the allowed range.
    ///
    /// Non-positive or non-finite ratios are ignored.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    /// Zoom the viewport, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let image_point = self.screen_to_image(screen_point);
        self.zoom = new_zoom;

        // Adjust offset so image_point stays at screen_point
        let new_screen = self.image_to_screen(image_point);
        self.offset += Vec2::new(screen_point.x - new_screen.x, screen_point.y - new_screen.y);
    }

    pub fn rotate(&mut self, degrees: f64) {
        self.rotation = (self.rotation + degrees) % 360.0;
    }

    pub fn reset_rotation(&mut self) {
        self.rotation = 0.0;
    }
}

impl Viewer for Viewport {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn screen_to_image(&self, screen: Point) -> Point {
        Viewport::screen_to_image(self, screen)
    }
}
