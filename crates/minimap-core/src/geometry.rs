//! Coordinate mapping between document space and canvas space.

use crate::config::MinimapConfig;
use crate::dom::PageMetrics;
use kurbo::{Affine, Rect, Size};

/// Thinnest stroke painted on the canvas. Scaled borders below one device
/// pixel would otherwise vanish.
pub const MIN_STROKE_WIDTH: f64 = 0.5;

/// Maps document geometry onto the minimap canvas.
///
/// One mapper is built per render pass and shared by the sampler, the
/// highlight detector and the painter, so every layer uses the same scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    /// Document-space to canvas-space ratio.
    pub scale: f64,
}

impl CoordinateMapper {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    /// Transform from viewport-relative coordinates to canvas coordinates
    /// for the given scroll offset.
    pub fn transform(&self, scroll_top: f64) -> Affine {
        Affine::scale(self.scale) * Affine::translate((0.0, scroll_top))
    }

    /// Map a viewport-relative rectangle to the canvas.
    ///
    /// `x = left * scale`, `y = (top + scroll) * scale`, sizes scale alike.
    pub fn map(&self, rect: Rect, scroll_top: f64) -> Rect {
        self.transform(scroll_top).transform_rect_bbox(rect)
    }

    /// Shift a viewport-relative rectangle into document space.
    pub fn to_document(&self, rect: Rect, scroll_top: f64) -> Rect {
        rect + kurbo::Vec2::new(0.0, scroll_top)
    }

    /// Scale a document-space rectangle onto the canvas.
    pub fn to_canvas(&self, rect: Rect) -> Rect {
        Affine::scale(self.scale).transform_rect_bbox(rect)
    }

    /// Grow a document-space rectangle so that its canvas footprint is at
    /// least `min` pixels in each direction. The origin stays fixed.
    pub fn with_min_canvas_size(&self, rect: Rect, min: Size) -> Rect {
        let width = rect.width().max(min.width / self.scale);
        let height = rect.height().max(min.height / self.scale);
        Rect::from_origin_size(rect.origin(), Size::new(width, height))
    }

    /// Canvas stroke width for a document-space border width.
    pub fn stroke_width(&self, width: f64) -> f64 {
        (width * self.scale).max(MIN_STROKE_WIDTH)
    }

    /// Whether a canvas rectangle overlaps the vertical canvas range.
    pub fn is_on_canvas(canvas_rect: Rect, canvas_height: f64) -> bool {
        !(canvas_rect.y0 > canvas_height || canvas_rect.y1 < 0.0)
    }

    /// Logical canvas size for the current page.
    ///
    /// Height is `min(document_height * scale, window_height - reserved)`.
    pub fn canvas_size(&self, metrics: &PageMetrics, config: &MinimapConfig) -> Size {
        let scaled = metrics.document_height * self.scale;
        let cap = metrics.window_height - config.reserved_chrome;
        Size::new(config.width, scaled.min(cap).max(0.0))
    }
}

impl From<&MinimapConfig> for CoordinateMapper {
    fn from(config: &MinimapConfig) -> Self {
        Self::new(config.scale)
    }
}
