//! Offline rendering of document snapshots to PNG.

use crate::minimap::MinimapResult;
use minimap_core::config::MinimapConfig;
use minimap_core::dom::StaticDocument;
use minimap_render::{DisplayList, PassReport, RasterImage, RenderError, RenderPipeline, RenderResult, rasterize};
use std::path::Path;

/// A rendered snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: RasterImage,
    pub report: PassReport,
}

/// Load a document snapshot from a JSON file.
pub fn load_document(path: &Path) -> MinimapResult<StaticDocument> {
    let json = std::fs::read_to_string(path)?;
    Ok(StaticDocument::from_json(&json)?)
}

/// Load a configuration from a JSON file.
pub fn load_config(path: &Path) -> MinimapResult<MinimapConfig> {
    let json = std::fs::read_to_string(path)?;
    Ok(MinimapConfig::from_json(&json)?)
}

/// Run one render pass over `document` and rasterize the result.
///
/// With `vello-renderer` the pass is rendered on the GPU; without a usable
/// adapter it falls back to the software rasterizer.
pub fn render_snapshot(document: &StaticDocument, config: MinimapConfig) -> MinimapResult<Snapshot> {
    config.validate()?;
    let pipeline = RenderPipeline::new(config);

    #[cfg(all(feature = "vello-renderer", not(target_arch = "wasm32")))]
    match minimap_render::VelloRasterizer::new() {
        Ok(mut rasterizer) => {
            let mut surface = minimap_render::VelloSurface::new(kurbo::Size::ZERO);
            let report = pipeline.run(document, &mut surface);
            let image = rasterizer.rasterize(surface.scene(), report.canvas)?;
            return Ok(Snapshot { image, report });
        }
        Err(e) => log::warn!("GPU rasterizer unavailable ({}), using software rasterizer", e),
    }

    let mut surface = DisplayList::default();
    let report = pipeline.run(document, &mut surface);
    Ok(Snapshot {
        image: rasterize(&surface),
        report,
    })
}

/// Encode an image as an RGBA8 PNG.
pub fn encode_png(image: &RasterImage) -> RenderResult<Vec<u8>> {
    if image.width == 0 || image.height == 0 {
        return Err(RenderError::Encode(format!(
            "cannot encode an empty {}x{} image",
            image.width, image.height
        )));
    }

    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| RenderError::Encode(format!("PNG header: {}", e)))?;
        writer
            .write_image_data(&image.rgba_data)
            .map_err(|e| RenderError::Encode(format!("PNG data: {}", e)))?;
    }

    Ok(png_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use minimap_core::dom::{PageMetrics, StaticElement};
    use minimap_core::sampler::Fidelity;

    const SNAPSHOT: &str = r#"{
        "metrics": { "scroll_top": 0, "window_width": 1200, "window_height": 900, "document_height": 2500 },
        "body_background": "rgb(250, 250, 250)",
        "elements": [
            { "tag": "h1", "rect": { "x0": 40, "y0": 20, "x1": 800, "y1": 80 },
              "style": { "color": "rgb(20, 20, 20)", "font_size": "32px" }, "text": "Title" },
            { "tag": "mark", "rect": { "x0": 40, "y0": 200, "x1": 120, "y1": 220 } },
            { "tag": "div", "rect": { "x0": 1000, "y0": 20, "x1": 1180, "y1": 220 }, "minimap": true }
        ]
    }"#;

    #[test]
    fn test_render_snapshot_from_json() {
        let doc = StaticDocument::from_json(SNAPSHOT).unwrap();
        let snapshot = render_snapshot(&doc, MinimapConfig::default()).unwrap();

        // 2500 * 0.08 = 200 < 900 - 100.
        assert_eq!(snapshot.image.width, 180);
        assert_eq!(snapshot.image.height, 200);
        assert_eq!(snapshot.report.fidelity, Fidelity::Full);
        assert_eq!(snapshot.report.samples, 2);
        assert_eq!(snapshot.report.highlights.len(), 1);

        assert_eq!(snapshot.image.pixel(179, 199), Some([250, 250, 250, 255]));
        // Highlight region (canvas 3.2..9.6 x 16..18): yellow under a half
        // covering orange outline.
        let [r, g, b, a] = snapshot.image.pixel(6, 16).unwrap();
        assert_eq!((r, b, a), (255, 0, 255));
        assert!(g > 0x88 && g < 0xff);
    }

    #[test]
    fn test_encode_png_roundtrip_dimensions() {
        let doc = StaticDocument::new(PageMetrics::new(800.0, 600.0, 1000.0));
        let snapshot = render_snapshot(&doc, MinimapConfig::default()).unwrap();
        let bytes = encode_png(&snapshot.image).unwrap();

        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 180);
        assert_eq!(reader.info().height, 80);
    }

    #[test]
    fn test_encode_empty_image_fails() {
        // Window shorter than the reserved chrome leaves no canvas.
        let mut doc = StaticDocument::new(PageMetrics::new(800.0, 90.0, 1000.0));
        doc.push(StaticElement::new("p", Rect::new(0.0, 0.0, 100.0, 20.0)));
        let snapshot = render_snapshot(&doc, MinimapConfig::default()).unwrap();

        assert_eq!(snapshot.image.height, 0);
        assert!(matches!(encode_png(&snapshot.image), Err(RenderError::Encode(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let doc = StaticDocument::new(PageMetrics::new(800.0, 600.0, 1000.0));
        let config = MinimapConfig {
            width: -1.0,
            ..MinimapConfig::default()
        };
        assert!(render_snapshot(&doc, config).is_err());
    }
}
