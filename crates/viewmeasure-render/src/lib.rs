//! ViewMeasure Render Library
//!
//! Turns overlay primitives into `kurbo` shapes and `peniko` colors that a
//! paint backend can draw over the image.

mod surface;

pub use surface::{PaintItem, RenderResult, RendererError, SceneSurface, parse_color};
