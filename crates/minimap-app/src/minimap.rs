//! The minimap controller.
//!
//! [`Minimap`] owns everything one mounted instance needs: the host
//! document, the canvas surface, the timer queue, the panel and the render
//! scheduler. Host events are forwarded to it as method calls; it decides
//! through the scheduler whether to render, move the indicator or do
//! nothing.

use crate::panel::{MountError, Panel};
use kurbo::Size;
use minimap_core::config::{ConfigError, MinimapConfig};
use minimap_core::dom::{Document, MutationRecord};
use minimap_core::highlight::is_highlight_element;
use minimap_core::scheduler::{Action, Channel, ManualTimers, RenderScheduler, TimerQueue, Trigger};
use minimap_core::viewport;
use minimap_render::{PassReport, RenderError, RenderPipeline, Surface};
use std::time::Duration;
use thiserror::Error;

/// Attributes whose changes count as structural.
const WATCHED_ATTRIBUTES: &[&str] = &["style", "class"];

/// Minimap errors.
#[derive(Debug, Error)]
pub enum MinimapError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Mount failed: {0}")]
    Mount(#[from] MountError),
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for minimap operations.
pub type MinimapResult<T> = Result<T, MinimapError>;

/// One mounted minimap instance.
pub struct Minimap<D, S, T, P>
where
    D: Document,
    S: Surface,
    T: TimerQueue,
    P: Panel,
{
    document: D,
    surface: S,
    timers: T,
    panel: P,
    pipeline: RenderPipeline,
    scheduler: RenderScheduler<T::Handle>,
    canvas: Size,
    last_report: Option<PassReport>,
    render_count: usize,
    destroyed: bool,
}

impl<D, S, T, P> Minimap<D, S, T, P>
where
    D: Document,
    S: Surface,
    T: TimerQueue,
    P: Panel,
{
    /// Attach the panel, paint the first frame and start the periodic
    /// refresh.
    pub fn mount(config: MinimapConfig, document: D, surface: S, timers: T, mut panel: P) -> MinimapResult<Self> {
        config.validate()?;
        panel.attach()?;

        let mut minimap = Self {
            scheduler: RenderScheduler::new(&config),
            pipeline: RenderPipeline::new(config),
            document,
            surface,
            timers,
            panel,
            canvas: Size::ZERO,
            last_report: None,
            render_count: 0,
            destroyed: false,
        };

        minimap.render(Trigger::Initial);
        minimap.scheduler.start(&mut minimap.timers);
        log::info!(
            "Minimap mounted ({}x{} canvas)",
            minimap.canvas.width,
            minimap.canvas.height
        );
        Ok(minimap)
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn is_enabled(&self) -> bool {
        self.scheduler.is_enabled()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Current logical canvas size.
    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    /// Report of the most recent render pass.
    pub fn last_report(&self) -> Option<&PassReport> {
        self.last_report.as_ref()
    }

    /// Number of render passes run so far.
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    /// The page scrolled.
    pub fn on_scroll(&mut self) {
        if !self.destroyed {
            self.scheduler.scrolled(&mut self.timers);
        }
    }

    /// The window or the observed document resized.
    pub fn on_resize(&mut self) {
        if self.destroyed {
            return;
        }
        let action = self.scheduler.resized();
        self.apply(action);
    }

    /// A batch of mutation records arrived.
    ///
    /// Records targeting the minimap's own subtree are dropped. Any
    /// remaining child-list change or `style`/`class` change restarts the
    /// structural debounce; those that add or touch a highlight element also
    /// restart the highlight debounce.
    pub fn on_mutations(&mut self, records: &[MutationRecord<D::Element>]) {
        if self.destroyed {
            return;
        }

        let mut structural = false;
        let mut highlight = false;
        for record in records {
            if self.document.in_minimap(record.target()) {
                continue;
            }
            match record {
                MutationRecord::ChildList { added, .. } => {
                    structural = true;
                    highlight |= added
                        .iter()
                        .any(|element| is_highlight_element(&self.document, element));
                }
                MutationRecord::Attribute { target, name } => {
                    if !WATCHED_ATTRIBUTES.contains(&name.as_str()) {
                        continue;
                    }
                    structural = true;
                    highlight |= is_highlight_element(&self.document, target);
                }
            }
        }

        if structural {
            self.scheduler.structural_mutation(&mut self.timers);
        }
        if highlight {
            log::debug!("Highlight change detected");
            self.scheduler.highlight_mutation(&mut self.timers);
        }
    }

    /// A click landed `offset_y` pixels below the top of the canvas.
    pub fn on_click(&mut self, offset_y: f64) {
        if self.destroyed || !self.is_enabled() {
            return;
        }
        let metrics = self.document.metrics();
        let target = viewport::scroll_target(offset_y, self.canvas.height, &metrics);
        log::debug!("Minimap click at {} -> scroll to {}", offset_y, target);
        self.document.scroll_to(target);
    }

    /// A timer on `channel` fired.
    pub fn fire(&mut self, channel: Channel) {
        if self.destroyed {
            return;
        }
        let action = self.scheduler.fire(channel);
        self.apply(action);
    }

    /// Flip between enabled and disabled. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        let action = self.scheduler.toggle();
        let enabled = self.scheduler.is_enabled();
        self.panel.set_visible(enabled);
        self.apply(action);
        log::info!("Minimap {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    /// Cancel every timer and remove the panel. Idempotent; later calls to
    /// any method do nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scheduler.stop(&mut self.timers);
        self.panel.detach();
        self.destroyed = true;
        log::info!("Minimap destroyed");
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Render(trigger) => self.render(trigger),
            Action::UpdateViewport => self.update_viewport(),
            Action::Idle => {}
        }
    }

    fn render(&mut self, trigger: Trigger) {
        let report = self.pipeline.run(&self.document, &mut self.surface);
        self.canvas = report.canvas;
        self.panel.place_indicator(report.viewport);
        self.render_count += 1;
        log::debug!(
            "Render pass #{} ({:?}) took {:?}",
            self.render_count,
            trigger,
            report.elapsed
        );
        self.last_report = Some(report);
    }

    fn update_viewport(&mut self) {
        let metrics = self.document.metrics();
        let indicator = self.pipeline.viewport(&metrics, self.canvas.height);
        self.panel.place_indicator(indicator);
    }
}

impl<D, S, P> Minimap<D, S, ManualTimers, P>
where
    D: Document,
    S: Surface,
    P: Panel,
{
    /// Advance the virtual clock, firing every timer that comes due.
    pub fn advance(&mut self, by: Duration) {
        let until = self.timers.now() + by;
        while let Some(channel) = self.timers.pop_due(until) {
            self.fire(channel);
        }
        self.timers.set_now(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use minimap_core::dom::{NodeId, PageMetrics, StaticDocument, StaticElement};
    use minimap_core::sampler::Fidelity;
    use minimap_core::viewport::ViewportIndicator;
    use minimap_render::DisplayList;
    use std::cell::Cell;
    use std::rc::Rc;

    type TestMinimap = Minimap<StaticDocument, DisplayList, ManualTimers, RecordingPanel>;

    /// Panel that records calls. Instances sharing `slot` share one document.
    #[derive(Default)]
    struct RecordingPanel {
        slot: Rc<Cell<bool>>,
        attached: bool,
        visible: bool,
        indicators: Vec<ViewportIndicator>,
        detach_count: usize,
    }

    impl RecordingPanel {
        fn sharing(slot: &Rc<Cell<bool>>) -> Self {
            Self {
                slot: slot.clone(),
                ..Self::default()
            }
        }
    }

    impl Panel for RecordingPanel {
        fn attach(&mut self) -> Result<(), MountError> {
            if self.slot.get() {
                return Err(MountError::AlreadyMounted);
            }
            self.slot.set(true);
            self.attached = true;
            self.visible = true;
            Ok(())
        }

        fn set_visible(&mut self, visible: bool) {
            self.visible = visible;
        }

        fn place_indicator(&mut self, indicator: ViewportIndicator) {
            self.indicators.push(indicator);
        }

        fn detach(&mut self) {
            if self.attached {
                self.attached = false;
                self.slot.set(false);
                self.detach_count += 1;
            }
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn page() -> StaticDocument {
        // Canvas 180 x 400.
        let mut doc = StaticDocument::new(PageMetrics::new(1000.0, 800.0, 5000.0));
        doc.push(StaticElement::new("main", Rect::from_origin_size((0.0, 0.0), (1000.0, 5000.0))));
        doc.push(
            StaticElement::new("p", Rect::from_origin_size((20.0, 40.0), (600.0, 80.0)))
                .with_text("Lorem ipsum")
                .with_style(|s| s.font_size = "30px".to_string()),
        );
        doc
    }

    fn mount(doc: StaticDocument) -> TestMinimap {
        Minimap::mount(
            MinimapConfig::default(),
            doc,
            DisplayList::default(),
            ManualTimers::new(),
            RecordingPanel::default(),
        )
        .unwrap()
    }

    fn added(target: usize, added: NodeId) -> MutationRecord<NodeId> {
        MutationRecord::ChildList {
            target: NodeId(target),
            added: vec![added],
        }
    }

    fn rgb(color: peniko::Color) -> (u8, u8, u8) {
        let c = color.to_rgba8();
        (c.r, c.g, c.b)
    }

    #[test]
    fn test_mount_renders_and_starts_periodic() {
        let minimap = mount(page());

        assert_eq!(minimap.render_count(), 1);
        assert_eq!(minimap.canvas_size(), Size::new(180.0, 400.0));
        assert_eq!(minimap.surface().size(), Size::new(180.0, 400.0));
        assert_eq!(minimap.timers().due(Channel::Periodic), Some(ms(2000)));
        assert_eq!(minimap.panel().indicators.len(), 1);
        assert!(minimap.panel().visible);
    }

    #[test]
    fn test_periodic_refresh() {
        let mut minimap = mount(page());
        minimap.advance(ms(4000));
        assert_eq!(minimap.render_count(), 3);
    }

    #[test]
    fn test_single_instance_guard() {
        let slot = Rc::new(Cell::new(false));
        let mount_shared = || {
            Minimap::mount(
                MinimapConfig::default(),
                page(),
                DisplayList::default(),
                ManualTimers::new(),
                RecordingPanel::sharing(&slot),
            )
        };

        let mut first = mount_shared().unwrap();
        let second = mount_shared();
        assert!(matches!(second, Err(MinimapError::Mount(MountError::AlreadyMounted))));

        first.destroy();
        assert!(mount_shared().is_ok());
    }

    #[test]
    fn test_invalid_config_rejected_before_attach() {
        let slot = Rc::new(Cell::new(false));
        let config = MinimapConfig {
            scale: 0.0,
            ..MinimapConfig::default()
        };
        let result = Minimap::mount(
            config,
            page(),
            DisplayList::default(),
            ManualTimers::new(),
            RecordingPanel::sharing(&slot),
        );
        assert!(matches!(result, Err(MinimapError::Config(_))));
        assert!(!slot.get());
    }

    #[test]
    fn test_mutation_burst_renders_once_after_quiet_period() {
        let mut minimap = mount(page());

        for i in 0..5 {
            let id = minimap
                .document_mut()
                .push(StaticElement::new("div", Rect::from_origin_size((0.0, 200.0 + i as f64 * 30.0), (300.0, 20.0))));
            minimap.on_mutations(&[added(0, id)]);
            minimap.advance(ms(50));
        }
        // Last mutation at t=200.
        minimap.advance(ms(149));
        assert_eq!(minimap.render_count(), 1);
        minimap.advance(ms(1));
        assert_eq!(minimap.render_count(), 2);
        minimap.advance(ms(500));
        assert_eq!(minimap.render_count(), 2);
    }

    #[test]
    fn test_added_mark_renders_within_highlight_debounce() {
        let mut minimap = mount(page());
        let mark = minimap
            .document_mut()
            .push(StaticElement::new("mark", Rect::from_origin_size((100.0, 60.0), (80.0, 20.0))));
        minimap.on_mutations(&[added(1, mark)]);

        minimap.advance(ms(99));
        assert_eq!(minimap.render_count(), 1);
        minimap.advance(ms(1));
        assert_eq!(minimap.render_count(), 2);

        let report = minimap.last_report().unwrap();
        assert_eq!(report.highlights.len(), 1);
        let commands = minimap.surface().commands();
        let n = commands.len();
        assert_eq!(rgb(commands[n - 2].color()), (0xff, 0xff, 0x00));
        assert_eq!(rgb(commands[n - 1].color()), (0xff, 0x88, 0x00));

        // The same child-list record is structural too.
        minimap.advance(ms(100));
        assert_eq!(minimap.render_count(), 3);
    }

    #[test]
    fn test_added_search_highlight_renders_within_highlight_debounce() {
        let mut minimap = mount(page());
        let span = minimap.document_mut().push(
            StaticElement::new("span", Rect::from_origin_size((100.0, 60.0), (80.0, 20.0)))
                .with_class("search-highlight"),
        );
        minimap.on_mutations(&[added(1, span)]);

        minimap.advance(ms(100));
        assert_eq!(minimap.render_count(), 2);
        assert_eq!(minimap.last_report().unwrap().highlights.len(), 1);
    }

    #[test]
    fn test_attribute_filter() {
        let mut minimap = mount(page());
        minimap.on_mutations(&[MutationRecord::Attribute {
            target: NodeId(1),
            name: "data-state".to_string(),
        }]);
        assert!(minimap.timers().due(Channel::Structural).is_none());

        minimap.on_mutations(&[MutationRecord::Attribute {
            target: NodeId(1),
            name: "class".to_string(),
        }]);
        assert_eq!(minimap.timers().due(Channel::Structural), Some(ms(200)));
        assert!(minimap.timers().due(Channel::Highlight).is_none());
    }

    #[test]
    fn test_own_mutations_ignored() {
        let mut doc = page();
        let indicator = doc.push(StaticElement::new("div", Rect::ZERO).in_minimap());
        let mut minimap = mount(doc);

        minimap.on_mutations(&[MutationRecord::Attribute {
            target: indicator,
            name: "style".to_string(),
        }]);
        assert!(minimap.timers().due(Channel::Structural).is_none());
        assert_eq!(minimap.timers().len(), 1);
    }

    #[test]
    fn test_resize_is_synchronous() {
        let mut minimap = mount(page());
        minimap.document_mut().metrics.window_height = 300.0;

        minimap.on_resize();

        assert_eq!(minimap.render_count(), 2);
        assert_eq!(minimap.canvas_size(), Size::new(180.0, 200.0));
        assert_eq!(minimap.surface().size(), Size::new(180.0, 200.0));
    }

    #[test]
    fn test_scroll_moves_indicator_without_rendering() {
        let mut minimap = mount(page());
        minimap.document_mut().set_scroll_top(1000.0);

        for _ in 0..5 {
            minimap.on_scroll();
        }
        minimap.advance(ms(16));

        assert_eq!(minimap.render_count(), 1);
        let indicator = *minimap.panel().indicators.last().unwrap();
        assert_eq!(minimap.panel().indicators.len(), 2);
        assert!((indicator.top - 80.0).abs() < 1e-9);
        assert!((indicator.height - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_scrolls_document() {
        let mut minimap = mount(page());
        minimap.on_click(80.0);
        assert_eq!(minimap.document().scroll_request(), Some(1000.0));

        minimap.on_click(400.0);
        assert_eq!(minimap.document().scroll_request(), Some(4200.0));
    }

    #[test]
    fn test_toggle() {
        let mut minimap = mount(page());

        assert!(!minimap.toggle());
        assert!(!minimap.panel().visible);
        minimap.advance(ms(2000));
        minimap.on_resize();
        assert_eq!(minimap.render_count(), 1);

        assert!(minimap.toggle());
        assert!(minimap.panel().visible);
        assert_eq!(minimap.render_count(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent_and_final() {
        let mut minimap = mount(page());
        minimap.on_mutations(&[added(0, NodeId(1))]);
        minimap.on_scroll();

        minimap.destroy();
        minimap.destroy();

        assert!(minimap.is_destroyed());
        assert_eq!(minimap.panel().detach_count, 1);
        assert!(minimap.timers().is_empty());

        minimap.on_mutations(&[added(0, NodeId(1))]);
        minimap.on_resize();
        minimap.on_click(50.0);
        assert!(!minimap.toggle());
        minimap.advance(ms(5000));

        assert!(minimap.timers().is_empty());
        assert_eq!(minimap.render_count(), 1);
        assert_eq!(minimap.document().scroll_request(), None);
    }

    #[test]
    fn test_style_failure_uses_fallback() {
        let mut doc = page();
        doc.push(StaticElement::new("h2", Rect::from_origin_size((0.0, 300.0), (500.0, 40.0))).with_style_failure("detached"));
        let minimap = mount(doc);

        let report = minimap.last_report().unwrap();
        assert_eq!(report.fidelity, Fidelity::Fallback);
        assert_eq!(minimap.panel().indicators.len(), 1);
    }
}
