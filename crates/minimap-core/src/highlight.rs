//! Search and selection highlight detection.
//!
//! Highlights are found by two independent passes over the document:
//! [`detect_by_selector`] matches fixed markers (tags, classes and yellow
//! inline backgrounds), [`detect_by_style`] infers highlights from computed
//! background colors and inline `background` declarations. Both return
//! canvas-space regions; the render pass paints them after the base layer.

use crate::dom::{Document, is_yellow};
use crate::geometry::CoordinateMapper;
use kurbo::{Rect, Size};
use peniko::Color;

/// Highlight tag names.
pub const HIGHLIGHT_TAGS: &[&str] = &["mark"];

/// Highlight class names.
pub const HIGHLIGHT_CLASSES: &[&str] = &["highlight", "search-highlight"];

/// Inline style fragments that encode a yellow background.
pub const INLINE_YELLOW_PATTERNS: &[&str] = &[
    "background-color: yellow",
    "background: yellow",
    "background-color:#ffff00",
    "background:#ffff00",
];

/// Which pass found a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightSource {
    Selector,
    Style,
}

/// A highlighted area on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightRegion {
    /// Canvas-space bounds, already grown to the minimum size.
    pub bounds: Rect,
    pub source: HighlightSource,
}

/// Paint attributes shared by every highlight region.
#[derive(Debug, Clone, Copy)]
pub struct HighlightStyle {
    pub fill: Color,
    pub outline: Color,
    pub outline_width: f64,
    /// Smallest canvas footprint of a region.
    pub min_size: Size,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            fill: Color::from_rgba8(0xff, 0xff, 0x00, 255),
            outline: Color::from_rgba8(0xff, 0x88, 0x00, 255),
            outline_width: 1.0,
            min_size: Size::new(3.0, 2.0),
        }
    }
}

/// Whether the element matches one of the fixed highlight markers.
pub fn matches_highlight_selector<D: Document>(document: &D, element: &D::Element) -> bool {
    let tag = document.tag_name(element);
    if HIGHLIGHT_TAGS.contains(&tag.as_str()) {
        return true;
    }
    if HIGHLIGHT_CLASSES.iter().any(|class| document.has_class(element, class)) {
        return true;
    }
    document
        .inline_style(element)
        .is_some_and(|style| INLINE_YELLOW_PATTERNS.iter().any(|pattern| style.contains(pattern)))
}

/// Whether the element's computed background is yellow or its inline style
/// declares any background. Unresolvable styles count as no match.
pub fn matches_highlight_style<D: Document>(document: &D, element: &D::Element) -> bool {
    let yellow = document
        .computed_style(element)
        .is_ok_and(|style| is_yellow(style.background));
    yellow
        || document
            .inline_style(element)
            .is_some_and(|style| style.contains("background"))
}

/// Whether a changed element should trigger the highlight refresh.
///
/// Any fixed marker counts, as does a computed yellow background.
pub fn is_highlight_element<D: Document>(document: &D, element: &D::Element) -> bool {
    if document.in_minimap(element) {
        return false;
    }
    matches_highlight_selector(document, element)
        || document
            .computed_style(element)
            .is_ok_and(|style| is_yellow(style.background))
}

/// Selector pass over every element of the document.
pub fn detect_by_selector<D: Document>(
    document: &D,
    mapper: &CoordinateMapper,
    style: &HighlightStyle,
    canvas_height: f64,
) -> Vec<HighlightRegion> {
    collect_regions(
        document,
        document.elements(),
        mapper,
        style,
        canvas_height,
        HighlightSource::Selector,
        matches_highlight_selector,
    )
}

/// Computed-style pass over the body subtree.
pub fn detect_by_style<D: Document>(
    document: &D,
    mapper: &CoordinateMapper,
    style: &HighlightStyle,
    canvas_height: f64,
) -> Vec<HighlightRegion> {
    collect_regions(
        document,
        document.body_elements(),
        mapper,
        style,
        canvas_height,
        HighlightSource::Style,
        matches_highlight_style,
    )
}

fn collect_regions<D: Document>(
    document: &D,
    elements: Vec<D::Element>,
    mapper: &CoordinateMapper,
    style: &HighlightStyle,
    canvas_height: f64,
    source: HighlightSource,
    matches: fn(&D, &D::Element) -> bool,
) -> Vec<HighlightRegion> {
    let scroll_top = document.metrics().scroll_top;

    elements
        .into_iter()
        .filter(|element| !document.in_minimap(element))
        .filter_map(|element| {
            let rect = document.bounding_rect(&element);
            if rect.area() == 0.0 || !matches(document, &element) {
                return None;
            }
            let bounds = mapper.to_canvas(mapper.with_min_canvas_size(mapper.to_document(rect, scroll_top), style.min_size));
            CoordinateMapper::is_on_canvas(bounds, canvas_height).then_some(HighlightRegion { bounds, source })
        })
        .collect()
}
