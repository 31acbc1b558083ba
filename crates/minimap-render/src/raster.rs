//! Software rasterization of a recorded display list.
//!
//! Every draw call is an axis-aligned rectangle, so coverage is computed
//! exactly as the overlap area between the shape and each pixel square.

use crate::surface::{DisplayList, DrawCommand, Surface};
use kurbo::Rect;
use peniko::Color;

/// RGBA8 image, row-major, straight alpha.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RasterImage {
    /// Pixel at `(x, y)` as `[r, g, b, a]`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = self.rgba_data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Premultiplied float accumulation buffer.
struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 4]>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width * height],
        }
    }

    /// Composite `color` source-over, weighted by the per-pixel coverage.
    fn paint(&mut self, bounds: Rect, color: Color, coverage: impl Fn(Rect) -> f64) {
        let bounds = bounds.intersect(Rect::new(0.0, 0.0, self.width as f64, self.height as f64));
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return;
        }

        let rgba = color.to_rgba8();
        let src = [rgba.r as f32 / 255.0, rgba.g as f32 / 255.0, rgba.b as f32 / 255.0];
        let src_alpha = rgba.a as f32 / 255.0;

        let x0 = bounds.x0.floor() as usize;
        let y0 = bounds.y0.floor() as usize;
        let x1 = (bounds.x1.ceil() as usize).min(self.width);
        let y1 = (bounds.y1.ceil() as usize).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let cell = Rect::new(x as f64, y as f64, x as f64 + 1.0, y as f64 + 1.0);
                let alpha = src_alpha * coverage(cell).clamp(0.0, 1.0) as f32;
                if alpha <= 0.0 {
                    continue;
                }
                let dst = &mut self.pixels[y * self.width + x];
                let keep = 1.0 - alpha;
                dst[0] = src[0] * alpha + dst[0] * keep;
                dst[1] = src[1] * alpha + dst[1] * keep;
                dst[2] = src[2] * alpha + dst[2] * keep;
                dst[3] = alpha + dst[3] * keep;
            }
        }
    }

    fn into_image(self) -> RasterImage {
        let mut rgba_data = Vec::with_capacity(self.pixels.len() * 4);
        for [r, g, b, a] in self.pixels {
            if a <= 0.0 {
                rgba_data.extend_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            let channel = |v: f32| ((v / a).clamp(0.0, 1.0) * 255.0).round() as u8;
            rgba_data.extend_from_slice(&[channel(r), channel(g), channel(b), (a.clamp(0.0, 1.0) * 255.0).round() as u8]);
        }
        RasterImage {
            rgba_data,
            width: self.width as u32,
            height: self.height as u32,
        }
    }
}

fn overlap(a: Rect, b: Rect) -> f64 {
    let w = a.x1.min(b.x1) - a.x0.max(b.x0);
    let h = a.y1.min(b.y1) - a.y0.max(b.y0);
    if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
}

/// Rasterize the list's commands at its logical size, one pixel per unit.
pub fn rasterize(list: &DisplayList) -> RasterImage {
    let size = list_size(list);
    let mut canvas = Canvas::new(size.0, size.1);

    for command in list.commands() {
        match *command {
            DrawCommand::Fill { rect, color } => {
                let rect = rect.abs();
                canvas.paint(rect, color, |cell| overlap(rect, cell));
            }
            DrawCommand::Stroke { rect, color, width } => {
                if width <= 0.0 {
                    continue;
                }
                let rect = rect.abs();
                let half = width / 2.0;
                let outer = rect.inflate(half, half);
                let inner = rect.inflate(-half, -half);
                let hollow = inner.width() > 0.0 && inner.height() > 0.0;
                canvas.paint(outer, color, |cell| {
                    let inside = if hollow { overlap(inner, cell) } else { 0.0 };
                    overlap(outer, cell) - inside
                });
            }
        }
    }

    canvas.into_image()
}

fn list_size(list: &DisplayList) -> (usize, usize) {
    let size = list.size();
    let dim = |v: f64| if v.is_finite() && v > 0.0 { v.ceil() as usize } else { 0 };
    (dim(size.width), dim(size.height))
}
