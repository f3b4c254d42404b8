//! Retained scene surface for the measurement overlay.

use kurbo::{Circle, Line, Point, Rect, Shape, Stroke};
use peniko::Color;
use thiserror::Error;
use viewmeasure_core::overlay::{DrawSurface, Primitive, PrimitiveId};

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid color: {0}")]
    InvalidColor(String),
    #[error("Unknown primitive: {0}")]
    UnknownPrimitive(PrimitiveId),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// One paint command in image coordinates, ready for a paint backend.
#[derive(Debug, Clone)]
pub enum PaintItem {
    Fill {
        shape: Circle,
        color: Color,
    },
    Stroke {
        shape: Line,
        style: Stroke,
        color: Color,
    },
    Text {
        anchor: Point,
        text: String,
        size: f64,
        color: Color,
    },
}

impl PaintItem {
    /// Approximate bounds; text is measured as one em per character.
    pub fn bounds(&self) -> Rect {
        match self {
            PaintItem::Fill { shape, .. } => shape.bounding_box(),
            PaintItem::Stroke { shape, style, .. } => {
                let half = style.width / 2.0;
                shape.bounding_box().inflate(half, half)
            }
            PaintItem::Text { anchor, text, size, .. } => Rect::new(
                anchor.x,
                anchor.y - size,
                anchor.x + size * text.chars().count() as f64,
                anchor.y,
            ),
        }
    }
}

/// Parse a CSS color: `#rgb`, `#rrggbb`, `#rrggbbaa` or a basic name.
pub fn parse_color(color: &str) -> RenderResult<Color> {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| RendererError::InvalidColor(color.to_string()))
        };
        return match hex.len() {
            3 => Ok(Color::from_rgba8(
                channel(0..1)? * 17,
                channel(1..2)? * 17,
                channel(2..3)? * 17,
                255,
            )),
            6 => Ok(Color::from_rgba8(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Ok(Color::from_rgba8(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(RendererError::InvalidColor(color.to_string())),
        };
    }

    let rgba = match color.to_ascii_lowercase().as_str() {
        "black" => (0, 0, 0, 255),
        "white" => (255, 255, 255, 255),
        "grey" | "gray" => (128, 128, 128, 255),
        "red" => (255, 0, 0, 255),
        "green" => (0, 128, 0, 255),
        "blue" => (0, 0, 255, 255),
        "yellow" => (255, 255, 0, 255),
        "orange" => (255, 165, 0, 255),
        "transparent" => (0, 0, 0, 0),
        _ => return Err(RendererError::InvalidColor(color.to_string())),
    };
    Ok(Color::from_rgba8(rgba.0, rgba.1, rgba.2, rgba.3))
}

fn color_or_black(color: &str) -> Color {
    parse_color(color).unwrap_or_else(|e| {
        log::warn!("{}, painting black", e);
        Color::from_rgba8(0, 0, 0, 255)
    })
}

/// A [`DrawSurface`] that keeps primitives in paint order.
///
/// Updates keep a primitive's position in the stack; additions go on top.
#[derive(Debug, Default)]
pub struct SceneSurface {
    next_id: PrimitiveId,
    items: Vec<(PrimitiveId, Primitive)>,
}

impl SceneSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: PrimitiveId) -> RenderResult<&Primitive> {
        self.items
            .iter()
            .find(|(item_id, _)| *item_id == id)
            .map(|(_, primitive)| primitive)
            .ok_or(RendererError::UnknownPrimitive(id))
    }

    /// Primitives bottom to top.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.items.iter().map(|(_, primitive)| primitive)
    }

    /// Paint commands bottom to top.
    pub fn paint_list(&self) -> Vec<PaintItem> {
        self.primitives().map(paint_item).collect()
    }

    /// Union of every paint item's bounds.
    pub fn bounds(&self) -> Option<Rect> {
        self.paint_list()
            .iter()
            .map(PaintItem::bounds)
            .reduce(|a, b| a.union(b))
    }

    fn position(&self, id: PrimitiveId) -> Option<usize> {
        self.items.iter().position(|(item_id, _)| *item_id == id)
    }
}

fn paint_item(primitive: &Primitive) -> PaintItem {
    match primitive {
        Primitive::Circle { center, radius, fill } => PaintItem::Fill {
            shape: Circle::new(*center, *radius),
            color: color_or_black(fill),
        },
        Primitive::Line { from, to, stroke, width } => PaintItem::Stroke {
            shape: Line::new(*from, *to),
            style: Stroke::new(*width),
            color: color_or_black(stroke),
        },
        Primitive::Text {
            anchor,
            content,
            font_size,
            fill,
        } => PaintItem::Text {
            anchor: *anchor,
            text: content.clone(),
            size: *font_size,
            color: color_or_black(fill),
        },
    }
}

impl DrawSurface for SceneSurface {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId {
        self.next_id += 1;
        self.items.push((self.next_id, primitive));
        self.next_id
    }

    fn update(&mut self, id: PrimitiveId, primitive: Primitive) {
        match self.position(id) {
            Some(index) => self.items[index].1 = primitive,
            None => log::warn!("Update of unknown primitive {}", id),
        }
    }

    fn remove(&mut self, id: PrimitiveId) {
        if let Some(index) = self.position(id) {
            self.items.remove(index);
        }
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(color: Color) -> [u8; 4] {
        let c = color.to_rgba8();
        [c.r, c.g, c.b, c.a]
    }

    fn circle(fill: &str) -> Primitive {
        Primitive::Circle {
            center: Point::new(10.0, 10.0),
            radius: 5.0,
            fill: fill.to_string(),
        }
    }

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!(rgba(parse_color("#f00").unwrap()), [255, 0, 0, 255]);
        assert_eq!(rgba(parse_color("#00ff80").unwrap()), [0, 255, 128, 255]);
        assert_eq!(rgba(parse_color("#0000ff80").unwrap()), [0, 0, 255, 128]);
    }

    #[test]
    fn test_parse_named_colors() {
        assert_eq!(rgba(parse_color("grey").unwrap()), [128, 128, 128, 255]);
        assert_eq!(rgba(parse_color("Black").unwrap()), [0, 0, 0, 255]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_color("#12").is_err());
        assert!(parse_color("#gggggg").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn test_unknown_color_paints_black() {
        let mut surface = SceneSurface::new();
        surface.add(circle("not-a-color"));
        match &surface.paint_list()[0] {
            PaintItem::Fill { color, .. } => assert_eq!(rgba(*color), [0, 0, 0, 255]),
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[test]
    fn test_update_keeps_paint_order() {
        let mut surface = SceneSurface::new();
        let a = surface.add(circle("#ff0000"));
        let _b = surface.add(circle("#00ff00"));
        surface.update(a, circle("#0000ff"));

        let colors: Vec<[u8; 4]> = surface
            .paint_list()
            .into_iter()
            .map(|item| match item {
                PaintItem::Fill { color, .. } => rgba(color),
                _ => [0; 4],
            })
            .collect();
        assert_eq!(colors, vec![[0, 0, 255, 255], [0, 255, 0, 255]]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut surface = SceneSurface::new();
        let a = surface.add(circle("#000"));
        surface.add(circle("#000"));
        surface.remove(a);
        assert_eq!(surface.len(), 1);
        assert!(matches!(surface.get(a), Err(RendererError::UnknownPrimitive(_))));

        surface.clear();
        assert!(surface.is_empty());
        assert!(surface.bounds().is_none());
    }

    #[test]
    fn test_line_bounds_include_stroke() {
        let mut surface = SceneSurface::new();
        surface.add(Primitive::Line {
            from: Point::new(0.0, 0.0),
            to: Point::new(10.0, 0.0),
            stroke: "#000".to_string(),
            width: 4.0,
        });
        let bounds = surface.bounds().unwrap();
        assert_eq!(bounds, Rect::new(-2.0, -2.0, 12.0, 2.0));
    }
}
