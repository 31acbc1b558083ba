//! One render pass: size, sample, paint, detect highlights, place viewport.

use crate::painter::Painter;
use crate::surface::Surface;
use kurbo::Size;
use minimap_core::config::MinimapConfig;
use minimap_core::dom::{Document, PageMetrics, is_transparent};
use minimap_core::geometry::CoordinateMapper;
use minimap_core::highlight::{HighlightRegion, detect_by_selector, detect_by_style};
use minimap_core::sampler::{Fidelity, sample_fallback, sample_full};
use minimap_core::viewport::{self, ViewportIndicator};
use peniko::Color;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Outcome of a render pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub fidelity: Fidelity,
    /// Elements painted in the base layer.
    pub samples: usize,
    pub highlights: Vec<HighlightRegion>,
    pub canvas: Size,
    pub viewport: ViewportIndicator,
    pub elapsed: Duration,
}

/// Runs render passes with a fixed configuration.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    config: MinimapConfig,
    mapper: CoordinateMapper,
    painter: Painter,
}

impl RenderPipeline {
    pub fn new(config: MinimapConfig) -> Self {
        Self {
            mapper: CoordinateMapper::from(&config),
            painter: Painter::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &MinimapConfig {
        &self.config
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Canvas size the page currently calls for.
    pub fn canvas_size(&self, metrics: &PageMetrics) -> Size {
        self.mapper.canvas_size(metrics, &self.config)
    }

    /// Bring the surface to the size the page calls for. Only resizes (and
    /// therefore clears) when the size actually changed.
    pub fn resize<S: Surface>(&self, surface: &mut S, metrics: &PageMetrics) -> Size {
        let size = self.canvas_size(metrics);
        if surface.size() != size {
            log::debug!("Resizing minimap canvas to {}x{}", size.width, size.height);
            surface.resize(size);
        }
        size
    }

    /// Indicator position for the given page state.
    pub fn viewport(&self, metrics: &PageMetrics, canvas_height: f64) -> ViewportIndicator {
        viewport::indicator(metrics, canvas_height, self.config.min_viewport_height)
    }

    /// Run a complete pass over `document`, painting onto `surface`.
    ///
    /// Falls back to the category-colored sampler when any computed style
    /// cannot be resolved. Highlights and the viewport are produced either
    /// way.
    pub fn run<D: Document, S: Surface>(&self, document: &D, surface: &mut S) -> PassReport {
        let start = Instant::now();
        let metrics = document.metrics();
        let canvas = self.resize(surface, &metrics);
        surface.clear();

        let background = document
            .root_background()
            .filter(|color| !is_transparent(*color))
            .unwrap_or(Color::WHITE);

        let (fidelity, samples) = match sample_full(document, &self.mapper, canvas.height) {
            Ok(samples) => (Fidelity::Full, samples),
            Err(err) => {
                log::warn!("Minimap falling back to simplified rendering: {}", err);
                (Fidelity::Fallback, sample_fallback(document, &self.mapper, canvas.height))
            }
        };
        self.painter.paint_base(surface, background, &samples, &self.mapper);

        let style = self.painter.highlight_style();
        let mut highlights = detect_by_selector(document, &self.mapper, style, canvas.height);
        highlights.extend(detect_by_style(document, &self.mapper, style, canvas.height));
        self.painter.paint_highlights(surface, &highlights);

        let report = PassReport {
            fidelity,
            samples: samples.len(),
            highlights,
            canvas,
            viewport: self.viewport(&metrics, canvas.height),
            elapsed: start.elapsed(),
        };
        log::trace!(
            "Render pass: {:?}, {} samples, {} highlights in {:?}",
            report.fidelity,
            report.samples,
            report.highlights.len(),
            report.elapsed
        );
        report
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(MinimapConfig::default())
    }
}
