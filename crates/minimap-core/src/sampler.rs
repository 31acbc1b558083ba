//! Element sampling.
//!
//! Two strategies produce the per-element paint attributes of a render pass.
//! [`sample_full`] resolves every element's computed style and fails as a
//! whole if any resolution fails; [`sample_fallback`] only looks at a fixed
//! set of block-level tags and colors them by category, without touching
//! computed styles. The render pass picks the fallback when the full
//! sampler returns an error.

use crate::dom::{Document, ElementKind, StyleError, is_transparent};
use crate::geometry::CoordinateMapper;
use kurbo::{Rect, Size};
use peniko::Color;
use thiserror::Error;

/// Tags visited by the fallback sampler.
pub const FALLBACK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "div", "article", "section", "aside", "nav", "header",
    "footer", "main", "pre", "code", "blockquote", "ul", "ol", "li",
];

/// Smallest canvas footprint of a fallback block.
const FALLBACK_MIN_SIZE: Size = Size::new(2.0, 1.0);

/// Full-fidelity sampling failure.
#[derive(Debug, Error)]
#[error("Style resolution failed for <{tag}>: {source}")]
pub struct SampleError {
    pub tag: String,
    #[source]
    pub source: StyleError,
}

/// Which sampler produced a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Full,
    Fallback,
}

/// Element border.
#[derive(Debug, Clone, Copy)]
pub struct Border {
    pub color: Color,
    /// Width in document pixels.
    pub width: f64,
}

/// Text carried by an element, painted as synthetic lines.
#[derive(Debug, Clone, Copy)]
pub struct TextRun {
    pub color: Color,
    /// Font size in document pixels.
    pub font_size: f64,
}

/// Paint attributes of one element.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Bounds in document space (scroll already applied).
    pub bounds: Rect,
    pub kind: ElementKind,
    pub background: Option<Color>,
    pub border: Option<Border>,
    pub text: Option<TextRun>,
}

/// Sample every rendered element of the document.
///
/// The minimap's own subtree, zero-area elements, elements outside the
/// canvas' vertical range and `display: none` / `visibility: hidden`
/// elements are skipped. Geometry is checked before styles are resolved.
pub fn sample_full<D: Document>(
    document: &D,
    mapper: &CoordinateMapper,
    canvas_height: f64,
) -> Result<Vec<Sample>, SampleError> {
    let scroll_top = document.metrics().scroll_top;
    let mut samples = Vec::new();

    for element in document.elements() {
        if document.in_minimap(&element) {
            continue;
        }

        let rect = document.bounding_rect(&element);
        if rect.width() == 0.0 || rect.height() == 0.0 {
            continue;
        }

        let bounds = mapper.to_document(rect, scroll_top);
        if !CoordinateMapper::is_on_canvas(mapper.to_canvas(bounds), canvas_height) {
            continue;
        }

        let style = document.computed_style(&element).map_err(|source| SampleError {
            tag: document.tag_name(&element),
            source,
        })?;
        if !style.is_rendered() {
            continue;
        }

        let background = (!is_transparent(style.background)).then_some(style.background);
        let border = (style.border_width > 0.0 && !is_transparent(style.border_color)).then_some(Border {
            color: style.border_color,
            width: style.border_width,
        });
        let text = (document.has_text(&element) && !is_transparent(style.color)).then_some(TextRun {
            color: style.color,
            font_size: style.font_size,
        });

        samples.push(Sample {
            bounds,
            kind: ElementKind::from_tag(&document.tag_name(&element)),
            background,
            border,
            text,
        });
    }

    Ok(samples)
}

/// Sample the block-level allow-list with per-category colors.
///
/// Never resolves computed styles, so it cannot fail.
pub fn sample_fallback<D: Document>(
    document: &D,
    mapper: &CoordinateMapper,
    canvas_height: f64,
) -> Vec<Sample> {
    let scroll_top = document.metrics().scroll_top;
    let outline = fallback_outline();

    document
        .elements()
        .into_iter()
        .filter(|element| !document.in_minimap(element))
        .filter_map(|element| {
            let tag = document.tag_name(&element);
            if !FALLBACK_TAGS.contains(&tag.as_str()) {
                return None;
            }

            let rect = document.bounding_rect(&element);
            let bounds = mapper.with_min_canvas_size(mapper.to_document(rect, scroll_top), FALLBACK_MIN_SIZE);
            if !CoordinateMapper::is_on_canvas(mapper.to_canvas(bounds), canvas_height) {
                return None;
            }

            let kind = ElementKind::from_tag(&tag);
            Some(Sample {
                bounds,
                kind,
                background: Some(fallback_color(kind)),
                border: Some(outline),
                text: None,
            })
        })
        .collect()
}

/// Block color used by the fallback sampler.
pub fn fallback_color(kind: ElementKind) -> Color {
    match kind {
        ElementKind::Heading => Color::from_rgba8(0x4a, 0x90, 0xe2, 255),
        ElementKind::Paragraph => Color::from_rgba8(0xd5, 0xd5, 0xd5, 255),
        ElementKind::Preformatted => Color::from_rgba8(0x2d, 0x37, 0x48, 255),
        ElementKind::Blockquote => Color::from_rgba8(0x6c, 0x75, 0x7d, 255),
        ElementKind::Generic | ElementKind::Image => Color::from_rgba8(0xe8, 0xe8, 0xe8, 255),
    }
}

/// Light hairline around fallback blocks; zero width is floored to the
/// thinnest visible stroke when painted.
fn fallback_outline() -> Border {
    Border {
        color: Color::from_rgba8(0xcc, 0xcc, 0xcc, 255),
        width: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{PageMetrics, StaticDocument, StaticElement};

    fn page() -> StaticDocument {
        StaticDocument::new(PageMetrics::new(1000.0, 800.0, 5000.0))
    }

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect::from_origin_size((x, y), (w, h))
    }

    #[test]
    fn test_full_resolves_attributes() {
        let mut doc = page();
        doc.push(
            StaticElement::new("p", rect(10.0, 20.0, 300.0, 40.0))
                .with_text("hello world")
                .with_style(|s| {
                    s.background_color = "rgb(240, 240, 240)".to_string();
                    s.border_width = "2px".to_string();
                    s.border_color = "#333".to_string();
                    s.font_size = "20px".to_string();
                }),
        );

        let mapper = CoordinateMapper::new(0.1);
        let samples = sample_full(&doc, &mapper, 500.0).unwrap();
        assert_eq!(samples.len(), 1);

        let sample = &samples[0];
        assert_eq!(sample.kind, ElementKind::Paragraph);
        assert!(sample.background.is_some());
        let border = sample.border.unwrap();
        assert!((border.width - 2.0).abs() < f64::EPSILON);
        let text = sample.text.unwrap();
        assert!((text.font_size - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_applies_scroll() {
        let mut doc = page();
        doc.set_scroll_top(400.0);
        doc.push(StaticElement::new("div", rect(0.0, -100.0, 50.0, 50.0)));

        let samples = sample_full(&doc, &CoordinateMapper::new(0.1), 500.0).unwrap();
        assert!((samples[0].bounds.y0 - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_skips_minimap_subtree() {
        let mut doc = page();
        doc.push(StaticElement::new("div", rect(0.0, 0.0, 200.0, 300.0)).in_minimap());
        doc.push(StaticElement::new("canvas", rect(0.0, 0.0, 180.0, 280.0)).in_minimap());
        doc.push(StaticElement::new("p", rect(0.0, 0.0, 100.0, 20.0)));

        let samples = sample_full(&doc, &CoordinateMapper::new(0.08), 400.0).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].kind, ElementKind::Paragraph);
    }

    #[test]
    fn test_full_skips_zero_area_and_hidden() {
        let mut doc = page();
        doc.push(StaticElement::new("div", rect(0.0, 0.0, 0.0, 50.0)));
        doc.push(StaticElement::new("div", rect(0.0, 0.0, 50.0, 50.0)).with_style(|s| s.display = "none".to_string()));
        doc.push(
            StaticElement::new("div", rect(0.0, 0.0, 50.0, 50.0)).with_style(|s| s.visibility = "hidden".to_string()),
        );

        let samples = sample_full(&doc, &CoordinateMapper::new(0.08), 400.0).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_full_rejects_off_canvas_before_style() {
        let mut doc = page();
        // Would fail style resolution if it were not rejected on geometry first.
        doc.push(StaticElement::new("div", rect(0.0, 4000.0, 100.0, 100.0)).with_style_failure("unreachable"));

        let samples = sample_full(&doc, &CoordinateMapper::new(0.08), 100.0).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_full_transparent_attributes_dropped() {
        let mut doc = page();
        doc.push(
            StaticElement::new("span", rect(0.0, 0.0, 100.0, 20.0))
                .with_text("invisible ink")
                .with_style(|s| {
                    s.color = "transparent".to_string();
                    s.border_width = "1px".to_string();
                    s.border_color = "rgba(0, 0, 0, 0)".to_string();
                }),
        );

        let samples = sample_full(&doc, &CoordinateMapper::new(0.08), 400.0).unwrap();
        assert!(samples[0].background.is_none());
        assert!(samples[0].border.is_none());
        assert!(samples[0].text.is_none());
    }

    #[test]
    fn test_full_reports_failing_element() {
        let mut doc = page();
        doc.push(StaticElement::new("p", rect(0.0, 0.0, 100.0, 20.0)));
        doc.push(StaticElement::new("table", rect(0.0, 30.0, 100.0, 20.0)).with_style_failure("boom"));

        let err = sample_full(&doc, &CoordinateMapper::new(0.08), 400.0).unwrap_err();
        assert_eq!(err.tag, "table");
    }

    #[test]
    fn test_fallback_uses_allow_list_and_palette() {
        let mut doc = page();
        doc.push(StaticElement::new("h2", rect(0.0, 0.0, 400.0, 30.0)));
        doc.push(StaticElement::new("span", rect(0.0, 40.0, 100.0, 20.0)));
        doc.push(StaticElement::new("pre", rect(0.0, 80.0, 400.0, 200.0)).with_style_failure("ignored"));
        doc.push(StaticElement::new("li", rect(0.0, 300.0, 400.0, 20.0)));

        let samples = sample_fallback(&doc, &CoordinateMapper::new(0.08), 400.0);
        let kinds: Vec<_> = samples.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ElementKind::Heading, ElementKind::Preformatted, ElementKind::Generic]);

        let heading = samples[0].background.unwrap().to_rgba8();
        assert_eq!((heading.r, heading.g, heading.b), (0x4a, 0x90, 0xe2));
        assert!(samples.iter().all(|s| s.text.is_none() && s.border.is_some()));
    }

    #[test]
    fn test_fallback_enforces_min_size() {
        let mut doc = page();
        doc.push(StaticElement::new("div", rect(0.0, 0.0, 0.0, 0.0)));

        let mapper = CoordinateMapper::new(0.1);
        let samples = sample_fallback(&doc, &mapper, 400.0);
        let canvas = mapper.to_canvas(samples[0].bounds);
        assert!((canvas.width() - 2.0).abs() < 1e-9);
        assert!((canvas.height() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_skips_minimap_and_off_canvas() {
        let mut doc = page();
        doc.push(StaticElement::new("div", rect(0.0, 0.0, 200.0, 300.0)).in_minimap());
        doc.push(StaticElement::new("p", rect(0.0, 4500.0, 100.0, 20.0)));

        assert!(sample_fallback(&doc, &CoordinateMapper::new(0.08), 100.0).is_empty());
    }
}
