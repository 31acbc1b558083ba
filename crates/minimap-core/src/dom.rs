//! Host document abstraction.
//!
//! The minimap never owns the page it draws. Everything it needs from the
//! host (element traversal, geometry, computed styles, scroll metrics and the
//! one scroll request it makes) goes through the [`Document`] trait. The
//! browser backend implements it over `web-sys`; [`StaticDocument`] is a
//! serializable in-memory snapshot used by tests and the native renderer.

use kurbo::Rect;
use peniko::Color;
use peniko::color::{Srgb, parse_color};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use thiserror::Error;

/// Computed-style resolution errors.
#[derive(Debug, Clone, Error)]
pub enum StyleError {
    #[error("Computed style unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid {property} value {value:?}: {reason}")]
    InvalidColor {
        property: &'static str,
        value: String,
        reason: String,
    },
}

/// Scroll and size metrics of the host window and document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Vertical scroll offset of the window.
    pub scroll_top: f64,
    /// Inner width of the window.
    pub window_width: f64,
    /// Inner height of the window.
    pub window_height: f64,
    /// Full scrollable height of the document.
    pub document_height: f64,
}

impl PageMetrics {
    pub fn new(window_width: f64, window_height: f64, document_height: f64) -> Self {
        Self {
            scroll_top: 0.0,
            window_width,
            window_height,
            document_height,
        }
    }

    /// Largest valid scroll offset.
    pub fn max_scroll(&self) -> f64 {
        (self.document_height - self.window_height).max(0.0)
    }
}

/// Element category derived from the tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Generic,
    Heading,
    Paragraph,
    Preformatted,
    Blockquote,
    Image,
}

impl ElementKind {
    /// Classify a lower-case tag name.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ElementKind::Heading,
            "p" => ElementKind::Paragraph,
            "pre" | "code" => ElementKind::Preformatted,
            "blockquote" => ElementKind::Blockquote,
            "img" => ElementKind::Image,
            _ => ElementKind::Generic,
        }
    }
}

/// Computed style as the host reports it: CSS strings, unparsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStyle {
    pub display: String,
    pub visibility: String,
    pub background_color: String,
    pub border_color: String,
    pub border_width: String,
    pub color: String,
    pub font_size: String,
}

impl Default for RawStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            background_color: "rgba(0, 0, 0, 0)".to_string(),
            border_color: "rgb(0, 0, 0)".to_string(),
            border_width: "0px".to_string(),
            color: "rgb(0, 0, 0)".to_string(),
            font_size: "16px".to_string(),
        }
    }
}

/// Font size assumed when the host reports none.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Resolved visual attributes of one element.
#[derive(Debug, Clone, Copy)]
pub struct ComputedStyle {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub background: Color,
    pub border_color: Color,
    pub border_width: f64,
    pub color: Color,
    pub font_size: f64,
}

impl ComputedStyle {
    /// Parse the raw CSS strings. An unparseable color is a resolution failure.
    pub fn resolve(raw: &RawStyle) -> Result<Self, StyleError> {
        Ok(Self {
            display_none: raw.display.trim() == "none",
            visibility_hidden: raw.visibility.trim() == "hidden",
            background: parse_css_color("background-color", &raw.background_color)?,
            border_color: parse_css_color("border-color", &raw.border_color)?,
            border_width: parse_px(&raw.border_width).unwrap_or(0.0),
            color: parse_css_color("color", &raw.color)?,
            font_size: parse_px(&raw.font_size)
                .filter(|size| *size > 0.0)
                .unwrap_or(DEFAULT_FONT_SIZE),
        })
    }

    /// Whether the element takes part in rendering at all.
    pub fn is_rendered(&self) -> bool {
        !self.display_none && !self.visibility_hidden
    }
}

/// Parse a CSS color. An empty value means no color was set.
pub fn parse_css_color(property: &'static str, value: &str) -> Result<Color, StyleError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Color::from_rgba8(0, 0, 0, 0));
    }
    parse_color(value)
        .map(|color| color.to_alpha_color::<Srgb>())
        .map_err(|e| StyleError::InvalidColor {
            property,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Leading numeric prefix of a CSS length, like `parseFloat("1.5px")`.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let end = value
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    value[..end].parse().ok()
}

pub fn is_transparent(color: Color) -> bool {
    color.to_rgba8().a == 0
}

/// Opaque `rgb(255, 255, 0)`, the computed form of `yellow`.
pub fn is_yellow(color: Color) -> bool {
    let rgba = color.to_rgba8();
    (rgba.r, rgba.g, rgba.b, rgba.a) == (255, 255, 0, 255)
}

/// A change notification delivered by the host's mutation observer.
#[derive(Debug, Clone)]
pub enum MutationRecord<E> {
    /// Children were inserted or removed under `target`.
    ChildList { target: E, added: Vec<E> },
    /// An attribute changed on `target`.
    Attribute { target: E, name: String },
}

impl<E> MutationRecord<E> {
    pub fn target(&self) -> &E {
        match self {
            MutationRecord::ChildList { target, .. } | MutationRecord::Attribute { target, .. } => target,
        }
    }
}

/// Read access to the host document, plus the single scroll request the
/// minimap is allowed to make.
pub trait Document {
    /// Handle to one element of the host tree.
    type Element: Clone;

    /// Every element in document order.
    fn elements(&self) -> Vec<Self::Element>;

    /// Every element below the body, in document order.
    fn body_elements(&self) -> Vec<Self::Element>;

    /// True for the minimap panel and everything inside it.
    fn in_minimap(&self, element: &Self::Element) -> bool;

    /// Lower-case tag name.
    fn tag_name(&self, element: &Self::Element) -> String;

    fn has_class(&self, element: &Self::Element, class: &str) -> bool;

    /// Raw `style` attribute, if any.
    fn inline_style(&self, element: &Self::Element) -> Option<String>;

    /// Whether the element carries non-whitespace text.
    fn has_text(&self, element: &Self::Element) -> bool;

    /// Bounding rectangle relative to the window viewport.
    fn bounding_rect(&self, element: &Self::Element) -> Rect;

    fn computed_style(&self, element: &Self::Element) -> Result<ComputedStyle, StyleError>;

    /// Computed background of the document body.
    fn root_background(&self) -> Option<Color>;

    fn metrics(&self) -> PageMetrics;

    /// Smooth-scroll the window to `top`.
    fn scroll_to(&self, top: f64);
}

/// Index of an element in a [`StaticDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

fn default_true() -> bool {
    true
}

/// One element of a [`StaticDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticElement {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Raw `style` attribute.
    #[serde(default)]
    pub inline_style: Option<String>,
    /// Viewport-relative bounding rectangle.
    pub rect: Rect,
    #[serde(default)]
    pub style: RawStyle,
    #[serde(default)]
    pub text: Option<String>,
    /// Whether the element is below the body.
    #[serde(default = "default_true")]
    pub in_body: bool,
    /// Whether the element belongs to the minimap panel.
    #[serde(default)]
    pub minimap: bool,
    /// Forces computed-style resolution to fail with this message.
    #[serde(default)]
    pub style_failure: Option<String>,
}

impl StaticElement {
    pub fn new(tag: &str, rect: Rect) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            inline_style: None,
            rect,
            style: RawStyle::default(),
            text: None,
            in_body: true,
            minimap: false,
            style_failure: None,
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_inline_style(mut self, style: &str) -> Self {
        self.inline_style = Some(style.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_style(mut self, edit: impl FnOnce(&mut RawStyle)) -> Self {
        edit(&mut self.style);
        self
    }

    /// Mark the element as part of the minimap panel.
    pub fn in_minimap(mut self) -> Self {
        self.minimap = true;
        self
    }

    pub fn with_style_failure(mut self, message: &str) -> Self {
        self.style_failure = Some(message.to_string());
        self
    }
}

/// In-memory document snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticDocument {
    pub metrics: PageMetrics,
    /// Computed body background.
    #[serde(default)]
    pub body_background: Option<String>,
    /// Elements in document order.
    #[serde(default)]
    pub elements: Vec<StaticElement>,
    #[serde(skip)]
    scroll_request: Cell<Option<f64>>,
}

impl StaticDocument {
    pub fn new(metrics: PageMetrics) -> Self {
        Self {
            metrics,
            body_background: None,
            elements: Vec::new(),
            scroll_request: Cell::new(None),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Append an element at the end of document order.
    pub fn push(&mut self, element: StaticElement) -> NodeId {
        self.elements.push(element);
        NodeId(self.elements.len() - 1)
    }

    pub fn element(&self, id: NodeId) -> Option<&StaticElement> {
        self.elements.get(id.0)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut StaticElement> {
        self.elements.get_mut(id.0)
    }

    pub fn set_scroll_top(&mut self, scroll_top: f64) {
        self.metrics.scroll_top = scroll_top;
    }

    /// The most recent scroll requested through [`Document::scroll_to`].
    pub fn scroll_request(&self) -> Option<f64> {
        self.scroll_request.get()
    }

    fn get(&self, id: &NodeId) -> Option<&StaticElement> {
        self.elements.get(id.0)
    }
}

impl Document for StaticDocument {
    type Element = NodeId;

    fn elements(&self) -> Vec<NodeId> {
        (0..self.elements.len()).map(NodeId).collect()
    }

    fn body_elements(&self) -> Vec<NodeId> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.in_body)
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    fn in_minimap(&self, element: &NodeId) -> bool {
        self.get(element).is_some_and(|el| el.minimap)
    }

    fn tag_name(&self, element: &NodeId) -> String {
        self.get(element).map(|el| el.tag.clone()).unwrap_or_default()
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.get(element)
            .is_some_and(|el| el.classes.iter().any(|c| c == class))
    }

    fn inline_style(&self, element: &NodeId) -> Option<String> {
        self.get(element).and_then(|el| el.inline_style.clone())
    }

    fn has_text(&self, element: &NodeId) -> bool {
        self.get(element)
            .and_then(|el| el.text.as_deref())
            .is_some_and(|text| !text.trim().is_empty())
    }

    fn bounding_rect(&self, element: &NodeId) -> Rect {
        self.get(element).map(|el| el.rect).unwrap_or(Rect::ZERO)
    }

    fn computed_style(&self, element: &NodeId) -> Result<ComputedStyle, StyleError> {
        let el = self
            .get(element)
            .ok_or_else(|| StyleError::Unavailable(format!("no element {}", element.0)))?;
        if let Some(message) = &el.style_failure {
            return Err(StyleError::Unavailable(message.clone()));
        }
        ComputedStyle::resolve(&el.style)
    }

    fn root_background(&self) -> Option<Color> {
        let value = self.body_background.as_deref()?;
        parse_css_color("background-color", value).ok()
    }

    fn metrics(&self) -> PageMetrics {
        self.metrics
    }

    fn scroll_to(&self, top: f64) {
        self.scroll_request.set(Some(top));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kind_from_tag() {
        assert_eq!(ElementKind::from_tag("h3"), ElementKind::Heading);
        assert_eq!(ElementKind::from_tag("p"), ElementKind::Paragraph);
        assert_eq!(ElementKind::from_tag("code"), ElementKind::Preformatted);
        assert_eq!(ElementKind::from_tag("blockquote"), ElementKind::Blockquote);
        assert_eq!(ElementKind::from_tag("img"), ElementKind::Image);
        assert_eq!(ElementKind::from_tag("span"), ElementKind::Generic);
    }

    #[test]
    fn test_parse_px() {
        assert_eq!(parse_px("16px"), Some(16.0));
        assert_eq!(parse_px(" 1.5px 0px"), Some(1.5));
        assert_eq!(parse_px("medium"), None);
        assert_eq!(parse_px(""), None);
    }

    #[test]
    fn test_resolve_default_style() {
        let style = ComputedStyle::resolve(&RawStyle::default()).unwrap();
        assert!(style.is_rendered());
        assert!(is_transparent(style.background));
        assert!((style.font_size - 16.0).abs() < f64::EPSILON);
        assert!(style.border_width.abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_hidden() {
        let raw = RawStyle {
            visibility: "hidden".to_string(),
            ..RawStyle::default()
        };
        assert!(!ComputedStyle::resolve(&raw).unwrap().is_rendered());

        let raw = RawStyle {
            display: "none".to_string(),
            ..RawStyle::default()
        };
        assert!(!ComputedStyle::resolve(&raw).unwrap().is_rendered());
    }

    #[test]
    fn test_resolve_rejects_bad_color() {
        let raw = RawStyle {
            background_color: "not-a-color(1)".to_string(),
            ..RawStyle::default()
        };
        assert!(matches!(
            ComputedStyle::resolve(&raw),
            Err(StyleError::InvalidColor { property: "background-color", .. })
        ));
    }

    #[test]
    fn test_yellow_notations() {
        for value in ["yellow", "rgb(255, 255, 0)", "#ffff00", "#ff0"] {
            let color = parse_css_color("background-color", value).unwrap();
            assert!(is_yellow(color), "{value} should be yellow");
        }
        let translucent = parse_css_color("background-color", "rgba(255, 255, 0, 0.5)").unwrap();
        assert!(!is_yellow(translucent));
    }

    #[test]
    fn test_empty_color_is_transparent() {
        let color = parse_css_color("color", "  ").unwrap();
        assert!(is_transparent(color));
    }

    #[test]
    fn test_static_document_queries() {
        let mut doc = StaticDocument::new(PageMetrics::new(1024.0, 768.0, 4000.0));
        let head = doc.push(StaticElement {
            in_body: false,
            ..StaticElement::new("head", Rect::ZERO)
        });
        let mark = doc.push(
            StaticElement::new("MARK", Rect::new(0.0, 0.0, 10.0, 10.0))
                .with_class("hit")
                .with_text("needle"),
        );

        assert_eq!(doc.elements(), vec![head, mark]);
        assert_eq!(doc.body_elements(), vec![mark]);
        assert_eq!(doc.tag_name(&mark), "mark");
        assert!(doc.has_class(&mark, "hit"));
        assert!(doc.has_text(&mark));
        assert!(!doc.has_text(&head));
    }

    #[test]
    fn test_static_document_style_failure() {
        let mut doc = StaticDocument::new(PageMetrics::new(800.0, 600.0, 600.0));
        let id = doc.push(StaticElement::new("div", Rect::new(0.0, 0.0, 5.0, 5.0)).with_style_failure("detached"));
        assert!(matches!(doc.computed_style(&id), Err(StyleError::Unavailable(_))));
    }

    #[test]
    fn test_scroll_request_recorded() {
        let doc = StaticDocument::new(PageMetrics::new(800.0, 600.0, 2400.0));
        assert_eq!(doc.scroll_request(), None);
        doc.scroll_to(120.0);
        assert_eq!(doc.scroll_request(), Some(120.0));
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r##"{
            "metrics": { "scroll_top": 0, "window_width": 800, "window_height": 600, "document_height": 1200 },
            "body_background": "#fafafa",
            "elements": [
                { "tag": "p", "rect": { "x0": 10, "y0": 20, "x1": 310, "y1": 60 }, "text": "hello" }
            ]
        }"##;
        let doc = StaticDocument::from_json(json).unwrap();
        assert_eq!(doc.elements.len(), 1);
        assert!(doc.elements[0].in_body);
        assert!(doc.root_background().is_some());
    }
}
