//! Painting samples and highlight regions onto a surface.

use crate::surface::Surface;
use kurbo::{Rect, Size};
use minimap_core::config::MinimapConfig;
use minimap_core::dom::ElementKind;
use minimap_core::geometry::CoordinateMapper;
use minimap_core::highlight::{HighlightRegion, HighlightStyle};
use minimap_core::sampler::{Sample, TextRun};
use peniko::Color;

/// Line height as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Seeded random number generator (xorshift32) for text line widths.
#[derive(Debug, Clone)]
pub struct LineRng {
    state: u32,
}

impl LineRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Random float in range [0, 1)
    pub fn next_unit(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }
}

/// Synthetic text lines for an element's canvas rectangle.
///
/// Nothing is drawn once the scaled font drops below one pixel. Each line is
/// 70–100% of the element width; fonts of two pixels and up become blocks,
/// smaller ones one-pixel rules.
pub fn text_lines(bounds: Rect, text: &TextRun, scale: f64, max_lines: usize, rng: &mut LineRng) -> Vec<Rect> {
    let font = text.font_size * scale;
    if font < 1.0 {
        return Vec::new();
    }

    let line_height = font * LINE_HEIGHT_FACTOR;
    let count = ((bounds.height() / line_height).floor().max(0.0) as usize).min(max_lines);

    (0..count)
        .filter_map(|i| {
            let y = bounds.y0 + i as f64 * line_height;
            let line_width = bounds.width() * (0.7 + rng.next_unit() * 0.3);
            let (inset, width, height) = if font >= 2.0 {
                (2.0, line_width - 4.0, (font * 0.8).max(1.0))
            } else {
                (1.0, line_width - 2.0, 1.0)
            };
            (width > 0.0).then(|| Rect::from_origin_size((bounds.x0 + inset, y), (width, height)))
        })
        .collect()
}

/// Paints the base layer and the highlight overlay.
#[derive(Debug, Clone)]
pub struct Painter {
    max_text_lines: usize,
    text_seed: u32,
    highlight: HighlightStyle,
    image_fill: Color,
    image_outline: Color,
}

impl Default for Painter {
    fn default() -> Self {
        Self::new(&MinimapConfig::default())
    }
}

impl Painter {
    pub fn new(config: &MinimapConfig) -> Self {
        Self {
            max_text_lines: config.max_text_lines,
            text_seed: config.text_seed,
            highlight: HighlightStyle::default(),
            image_fill: Color::from_rgba8(0xe0, 0xe0, 0xe0, 255),
            image_outline: Color::from_rgba8(0xcc, 0xcc, 0xcc, 255),
        }
    }

    pub fn highlight_style(&self) -> &HighlightStyle {
        &self.highlight
    }

    /// Paint the background and every sample in traversal order.
    ///
    /// The line-width generator restarts from the configured seed on every
    /// call, so an unchanged document paints identical frames.
    pub fn paint_base<S: Surface>(&self, surface: &mut S, background: Color, samples: &[Sample], mapper: &CoordinateMapper) {
        let size = surface.size();
        surface.fill_rect(Rect::from_origin_size((0.0, 0.0), size), background);

        let mut rng = LineRng::new(self.text_seed);
        for sample in samples {
            self.paint_sample(surface, sample, mapper, &mut rng);
        }
    }

    fn paint_sample<S: Surface>(&self, surface: &mut S, sample: &Sample, mapper: &CoordinateMapper, rng: &mut LineRng) {
        let bounds = mapper.to_canvas(sample.bounds);

        if let Some(background) = sample.background {
            surface.fill_rect(bounds, background);
        }

        if let Some(border) = sample.border {
            surface.stroke_rect(bounds, border.color, mapper.stroke_width(border.width));
        }

        if let Some(text) = &sample.text {
            for line in text_lines(bounds, text, mapper.scale, self.max_text_lines, rng) {
                surface.fill_rect(line, text.color);
            }
        }

        if sample.kind == ElementKind::Image {
            surface.fill_rect(bounds, self.image_fill);
            surface.stroke_rect(bounds, self.image_outline, 1.0);
        }
    }

    /// Paint highlight regions over the base layer.
    pub fn paint_highlights<S: Surface>(&self, surface: &mut S, regions: &[HighlightRegion]) {
        for region in regions {
            let bounds = enforce_min(region.bounds, self.highlight.min_size);
            surface.fill_rect(bounds, self.highlight.fill);
            surface.stroke_rect(bounds, self.highlight.outline, self.highlight.outline_width);
        }
    }
}

fn enforce_min(rect: Rect, min: Size) -> Rect {
    Rect::from_origin_size(rect.origin(), Size::new(rect.width().max(min.width), rect.height().max(min.height)))
}
