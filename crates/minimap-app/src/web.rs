//! WebAssembly entry point and browser backends.
//!
//! The page's DOM, a 2D canvas, `setTimeout`/`setInterval` and a fixed
//! panel element back the generic [`Minimap`] controller. Host events reach
//! it through closures holding a weak reference to the mounted instance.

use crate::minimap::{Minimap, MinimapError, MinimapResult};
use crate::panel::{MountError, PANEL_ID, Panel};
use kurbo::{Rect, Size};
use minimap_core::config::MinimapConfig;
use minimap_core::dom::{ComputedStyle, Document, MutationRecord, PageMetrics, RawStyle, StyleError, parse_css_color};
use minimap_core::scheduler::{Channel, TimerQueue};
use minimap_core::viewport::ViewportIndicator;
use minimap_render::Surface;
use peniko::Color;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Element, HtmlCanvasElement, HtmlElement, Window};

const PANEL_STYLE: &str = "position: fixed; top: 20px; right: 20px; width: 180px; z-index: 2147483647; \
     background: #fff; border: 1px solid #ccc; border-radius: 4px; box-shadow: 0 2px 10px rgba(0, 0, 0, 0.2); \
     overflow: hidden;";
const CANVAS_STYLE: &str = "display: block; cursor: pointer;";
const INDICATOR_STYLE: &str = "position: absolute; left: 0; width: 100%; box-sizing: border-box; \
     background: rgba(0, 120, 255, 0.15); border: 1px solid rgba(0, 120, 255, 0.6); pointer-events: none;";

type WebMinimap = Minimap<WebDocument, CanvasSurface, WebTimers, WebPanel>;
type Shared = Rc<RefCell<Option<WebMinimap>>>;

fn js_error(value: JsValue) -> MountError {
    MountError::Host(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn collect_elements(list: web_sys::NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

/// The live page.
pub struct WebDocument {
    window: Window,
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new(window: Window) -> Result<Self, MountError> {
        let document = window
            .document()
            .ok_or_else(|| MountError::Host("window has no document".to_string()))?;
        Ok(Self { window, document })
    }

    pub fn dom(&self) -> &web_sys::Document {
        &self.document
    }

    fn raw_style(&self, element: &Element) -> Result<RawStyle, StyleError> {
        let style = self
            .window
            .get_computed_style(element)
            .map_err(|e| StyleError::Unavailable(format!("{:?}", e)))?
            .ok_or_else(|| StyleError::Unavailable("no computed style".to_string()))?;
        let property = |name: &str| style.get_property_value(name).unwrap_or_default();

        Ok(RawStyle {
            display: property("display"),
            visibility: property("visibility"),
            background_color: property("background-color"),
            border_color: property("border-top-color"),
            border_width: property("border-top-width"),
            color: property("color"),
            font_size: property("font-size"),
        })
    }
}

impl Document for WebDocument {
    type Element = Element;

    fn elements(&self) -> Vec<Element> {
        self.document
            .query_selector_all("*")
            .map(collect_elements)
            .unwrap_or_default()
    }

    fn body_elements(&self) -> Vec<Element> {
        self.document
            .body()
            .and_then(|body| body.query_selector_all("*").ok())
            .map(collect_elements)
            .unwrap_or_default()
    }

    fn in_minimap(&self, element: &Element) -> bool {
        element
            .closest(&format!("#{}", PANEL_ID))
            .ok()
            .flatten()
            .is_some()
    }

    fn tag_name(&self, element: &Element) -> String {
        element.tag_name().to_ascii_lowercase()
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn inline_style(&self, element: &Element) -> Option<String> {
        element.get_attribute("style")
    }

    fn has_text(&self, element: &Element) -> bool {
        element
            .text_content()
            .is_some_and(|text| !text.trim().is_empty())
    }

    fn bounding_rect(&self, element: &Element) -> Rect {
        let rect = element.get_bounding_client_rect();
        Rect::from_origin_size((rect.x(), rect.y()), (rect.width(), rect.height()))
    }

    fn computed_style(&self, element: &Element) -> Result<ComputedStyle, StyleError> {
        ComputedStyle::resolve(&self.raw_style(element)?)
    }

    fn root_background(&self) -> Option<Color> {
        let body = self.document.body()?;
        let style = self.raw_style(&body).ok()?;
        parse_css_color("background-color", &style.background_color).ok()
    }

    fn metrics(&self) -> PageMetrics {
        let number = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);

        let mut heights = Vec::with_capacity(5);
        if let Some(body) = self.document.body() {
            heights.push(body.scroll_height());
            heights.push(body.offset_height());
        }
        if let Some(root) = self.document.document_element() {
            heights.push(root.client_height());
            heights.push(root.scroll_height());
            if let Some(root) = root.dyn_ref::<HtmlElement>() {
                heights.push(root.offset_height());
            }
        }

        PageMetrics {
            scroll_top: self.window.scroll_y().unwrap_or(0.0),
            window_width: number(self.window.inner_width()),
            window_height: number(self.window.inner_height()),
            document_height: heights.into_iter().max().unwrap_or(0) as f64,
        }
    }

    fn scroll_to(&self, top: f64) {
        let options = web_sys::ScrollToOptions::new();
        options.set_top(top);
        options.set_behavior(web_sys::ScrollBehavior::Smooth);
        self.window.scroll_to_with_scroll_to_options(&options);
    }
}

/// A `<canvas>` with its 2D context.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    size: Size,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, MountError> {
        let context = canvas
            .get_context("2d")
            .map_err(js_error)?
            .ok_or_else(|| MountError::Host("2D context unavailable".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| MountError::Host("unexpected context type".to_string()))?;
        Ok(Self {
            canvas,
            context,
            size: Size::ZERO,
        })
    }
}

fn css_color(color: Color) -> String {
    let c = color.to_rgba8();
    format!("rgba({}, {}, {}, {})", c.r, c.g, c.b, c.a as f64 / 255.0)
}

impl Surface for CanvasSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        let width = size.width.round().max(0.0) as u32;
        let height = size.height.round().max(0.0) as u32;
        self.canvas.set_width(width);
        self.canvas.set_height(height);

        let style = self.canvas.style();
        let _ = style.set_property("width", &format!("{}px", width));
        let _ = style.set_property("height", &format!("{}px", height));
    }

    fn clear(&mut self) {
        self.context
            .clear_rect(0.0, 0.0, self.size.width, self.size.height);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.context.set_fill_style_str(&css_color(color));
        self.context
            .fill_rect(rect.x0, rect.y0, rect.width(), rect.height());
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64) {
        self.context.set_stroke_style_str(&css_color(color));
        self.context.set_line_width(width);
        self.context
            .stroke_rect(rect.x0, rect.y0, rect.width(), rect.height());
    }
}

/// Handle of a browser timer.
#[derive(Debug, Clone, Copy)]
pub struct WebTimer {
    id: i32,
    repeating: bool,
}

/// `setTimeout` / `setInterval` timers with one persistent callback per
/// channel.
pub struct WebTimers {
    window: Window,
    // Store closures to prevent them from being dropped
    callbacks: Vec<(Channel, Closure<dyn Fn()>)>,
}

impl WebTimers {
    pub fn new(window: Window, on_fire: impl Fn(Channel) + 'static) -> Self {
        let on_fire = Rc::new(on_fire);
        let callbacks = Channel::ALL
            .iter()
            .map(|&channel| {
                let on_fire = on_fire.clone();
                let callback = Closure::wrap(Box::new(move || on_fire(channel)) as Box<dyn Fn()>);
                (channel, callback)
            })
            .collect();
        Self { window, callbacks }
    }

    fn callback(&self, channel: Channel) -> Option<&js_sys::Function> {
        self.callbacks
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, callback)| callback.as_ref().unchecked_ref())
    }

    fn millis(duration: Duration) -> i32 {
        duration.as_millis().min(i32::MAX as u128) as i32
    }
}

impl TimerQueue for WebTimers {
    type Handle = WebTimer;

    fn schedule_once(&mut self, channel: Channel, delay: Duration) -> WebTimer {
        let id = self
            .callback(channel)
            .and_then(|callback| {
                self.window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(callback, Self::millis(delay))
                    .ok()
            })
            .unwrap_or_else(|| {
                log::warn!("Failed to schedule {:?} timer", channel);
                0
            });
        WebTimer { id, repeating: false }
    }

    fn schedule_repeating(&mut self, channel: Channel, period: Duration) -> WebTimer {
        let id = self
            .callback(channel)
            .and_then(|callback| {
                self.window
                    .set_interval_with_callback_and_timeout_and_arguments_0(callback, Self::millis(period))
                    .ok()
            })
            .unwrap_or_else(|| {
                log::warn!("Failed to schedule {:?} interval", channel);
                0
            });
        WebTimer { id, repeating: true }
    }

    fn cancel(&mut self, handle: WebTimer) {
        if handle.repeating {
            self.window.clear_interval_with_handle(handle.id);
        } else {
            self.window.clear_timeout_with_handle(handle.id);
        }
    }
}

/// The fixed panel holding the canvas and the viewport indicator.
pub struct WebPanel {
    document: web_sys::Document,
    root: HtmlElement,
    indicator: HtmlElement,
    attached: bool,
}

fn create_html(document: &web_sys::Document, tag: &str) -> Result<HtmlElement, MountError> {
    document
        .create_element(tag)
        .map_err(js_error)?
        .dyn_into::<HtmlElement>()
        .map_err(|_| MountError::Host(format!("<{}> is not an HTML element", tag)))
}

impl WebPanel {
    /// Build the panel around `canvas`. Nothing is inserted until
    /// [`Panel::attach`].
    pub fn new(document: &web_sys::Document, canvas: &HtmlCanvasElement) -> Result<Self, MountError> {
        let root = create_html(document, "div")?;
        root.set_id(PANEL_ID);
        root.set_class_name("live-minimap-container");
        root.style().set_css_text(PANEL_STYLE);

        canvas.set_class_name("minimap-canvas");
        canvas.style().set_css_text(CANVAS_STYLE);

        let indicator = create_html(document, "div")?;
        indicator.set_class_name("minimap-viewport");
        indicator.style().set_css_text(INDICATOR_STYLE);

        root.append_child(canvas).map_err(js_error)?;
        root.append_child(&indicator).map_err(js_error)?;

        Ok(Self {
            document: document.clone(),
            root,
            indicator,
            attached: false,
        })
    }
}

impl Panel for WebPanel {
    fn attach(&mut self) -> Result<(), MountError> {
        if self.document.get_element_by_id(PANEL_ID).is_some() {
            return Err(MountError::AlreadyMounted);
        }
        let body = self.document.body().ok_or(MountError::NoBody)?;
        body.append_child(&self.root).map_err(js_error)?;
        self.attached = true;
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        let display = if visible { "block" } else { "none" };
        let _ = self.root.style().set_property("display", display);
    }

    fn place_indicator(&mut self, indicator: ViewportIndicator) {
        let style = self.indicator.style();
        let _ = style.set_property("top", &format!("{}px", indicator.top));
        let _ = style.set_property("height", &format!("{}px", indicator.height));
    }

    fn detach(&mut self) {
        if self.attached {
            self.root.remove();
            self.attached = false;
        }
    }
}

/// Run `f` on the mounted instance, if it is still alive and not busy.
fn with_minimap(weak: &Weak<RefCell<Option<WebMinimap>>>, f: impl FnOnce(&mut WebMinimap)) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let Ok(mut guard) = shared.try_borrow_mut() else {
        log::warn!("Minimap busy, dropping event");
        return;
    };
    if let Some(minimap) = guard.as_mut() {
        f(minimap);
    }
}

fn convert_mutations(records: &js_sys::Array) -> Vec<MutationRecord<Element>> {
    records
        .iter()
        .filter_map(|value| value.dyn_into::<web_sys::MutationRecord>().ok())
        .filter_map(|record| {
            let target = record.target()?.dyn_into::<Element>().ok()?;
            match record.type_().as_str() {
                "childList" => Some(MutationRecord::ChildList {
                    target,
                    added: collect_elements(record.added_nodes()),
                }),
                "attributes" => Some(MutationRecord::Attribute {
                    target,
                    name: record.attribute_name().unwrap_or_default(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Event subscriptions of a mounted instance.
struct Listeners {
    window: Window,
    canvas: HtmlCanvasElement,
    on_scroll: Closure<dyn Fn()>,
    on_resize: Closure<dyn Fn()>,
    on_unload: Closure<dyn Fn()>,
    on_click: Closure<dyn Fn(web_sys::MouseEvent)>,
    mutations: web_sys::MutationObserver,
    _on_mutations: Closure<dyn Fn(js_sys::Array)>,
    resizes: web_sys::ResizeObserver,
    _on_resizes: Closure<dyn Fn()>,
}

impl Listeners {
    fn install(window: &Window, canvas: &HtmlCanvasElement, shared: &Shared) -> Result<Self, MountError> {
        let document = window
            .document()
            .ok_or_else(|| MountError::Host("window has no document".to_string()))?;
        let body = document.body().ok_or(MountError::NoBody)?;

        let weak = Rc::downgrade(shared);
        let on_scroll = Closure::wrap(Box::new(move || with_minimap(&weak, |m| m.on_scroll())) as Box<dyn Fn()>);
        window
            .add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref())
            .map_err(js_error)?;

        let weak = Rc::downgrade(shared);
        let on_resize = Closure::wrap(Box::new(move || with_minimap(&weak, |m| m.on_resize())) as Box<dyn Fn()>);
        window
            .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
            .map_err(js_error)?;

        let weak = Rc::downgrade(shared);
        let on_unload = Closure::wrap(Box::new(move || with_minimap(&weak, |m| m.destroy())) as Box<dyn Fn()>);
        window
            .add_event_listener_with_callback("beforeunload", on_unload.as_ref().unchecked_ref())
            .map_err(js_error)?;

        let weak = Rc::downgrade(shared);
        let on_click = Closure::wrap(Box::new(move |e: web_sys::MouseEvent| {
            let offset = e.offset_y() as f64;
            with_minimap(&weak, |m| m.on_click(offset));
        }) as Box<dyn Fn(web_sys::MouseEvent)>);
        canvas
            .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
            .map_err(js_error)?;

        let weak = Rc::downgrade(shared);
        let on_mutations = Closure::wrap(Box::new(move |records: js_sys::Array| {
            let records = convert_mutations(&records);
            with_minimap(&weak, |m| m.on_mutations(&records));
        }) as Box<dyn Fn(js_sys::Array)>);
        let mutations = web_sys::MutationObserver::new(on_mutations.as_ref().unchecked_ref()).map_err(js_error)?;
        let init = web_sys::MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_attributes(true);
        let filter = js_sys::Array::of2(&JsValue::from_str("style"), &JsValue::from_str("class"));
        init.set_attribute_filter(&filter);
        mutations.observe_with_options(&body, &init).map_err(js_error)?;

        let weak = Rc::downgrade(shared);
        let on_resizes = Closure::wrap(Box::new(move || with_minimap(&weak, |m| m.on_resize())) as Box<dyn Fn()>);
        let resizes = web_sys::ResizeObserver::new(on_resizes.as_ref().unchecked_ref()).map_err(js_error)?;
        resizes.observe(&body);
        if let Some(root) = document.document_element() {
            resizes.observe(&root);
        }

        Ok(Self {
            window: window.clone(),
            canvas: canvas.clone(),
            on_scroll,
            on_resize,
            on_unload,
            on_click,
            mutations,
            _on_mutations: on_mutations,
            resizes,
            _on_resizes: on_resizes,
        })
    }

    /// Unsubscribe from everything. The closures stay alive until the
    /// listeners are dropped.
    fn detach(&self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("scroll", self.on_scroll.as_ref().unchecked_ref());
        let _ = self
            .window
            .remove_event_listener_with_callback("resize", self.on_resize.as_ref().unchecked_ref());
        let _ = self
            .window
            .remove_event_listener_with_callback("beforeunload", self.on_unload.as_ref().unchecked_ref());
        let _ = self
            .canvas
            .remove_event_listener_with_callback("click", self.on_click.as_ref().unchecked_ref());
        self.mutations.disconnect();
        self.resizes.disconnect();
    }
}

/// A mounted instance and its subscriptions.
struct Instance {
    shared: Shared,
    listeners: Listeners,
}

impl Instance {
    fn mount(config: MinimapConfig) -> MinimapResult<Self> {
        let window = web_sys::window().ok_or_else(|| MountError::Host("no window".to_string()))?;
        let document = WebDocument::new(window.clone())?;
        let canvas = create_html(document.dom(), "canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| MountError::Host("<canvas> unavailable".to_string()))?;
        let panel = WebPanel::new(document.dom(), &canvas)?;
        let surface = CanvasSurface::new(canvas.clone())?;

        let shared: Shared = Rc::new(RefCell::new(None));
        let weak = Rc::downgrade(&shared);
        let timers = WebTimers::new(window.clone(), move |channel| with_minimap(&weak, |m| m.fire(channel)));

        let minimap = Minimap::mount(config, document, surface, timers, panel)?;
        *shared.borrow_mut() = Some(minimap);

        match Listeners::install(&window, &canvas, &shared) {
            Ok(listeners) => Ok(Self { shared, listeners }),
            Err(e) => {
                if let Some(minimap) = shared.borrow_mut().as_mut() {
                    minimap.destroy();
                }
                Err(e.into())
            }
        }
    }

    fn is_live(&self) -> bool {
        self.shared
            .borrow()
            .as_ref()
            .is_some_and(|m| !m.is_destroyed())
    }

    fn toggle(&self) -> bool {
        self.shared
            .borrow_mut()
            .as_mut()
            .is_some_and(|m| m.toggle())
    }

    fn destroy(&self) {
        if let Some(minimap) = self.shared.borrow_mut().as_mut() {
            minimap.destroy();
        }
        self.listeners.detach();
    }
}

thread_local! {
    static INSTANCE: RefCell<Option<Instance>> = const { RefCell::new(None) };
}

/// Mount the minimap on the current page.
///
/// `config` is an optional JSON object of configuration overrides.
#[wasm_bindgen(js_name = mountMinimap)]
pub fn mount_minimap(config: Option<String>) -> Result<(), JsValue> {
    let result = INSTANCE.with(|slot| {
        if slot.borrow().as_ref().is_some_and(Instance::is_live) {
            return Err(MinimapError::Mount(MountError::AlreadyMounted));
        }
        // A previous instance torn down by page unload still holds listeners.
        let stale = slot.borrow_mut().take();
        if let Some(stale) = stale {
            stale.destroy();
        }
        let config = match config {
            Some(json) => MinimapConfig::from_json(&json)?,
            None => MinimapConfig::default(),
        };
        let instance = Instance::mount(config)?;
        *slot.borrow_mut() = Some(instance);
        Ok(())
    });
    result.map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Flip the mounted minimap on or off. Returns the new state.
#[wasm_bindgen(js_name = toggleMinimap)]
pub fn toggle_minimap() -> bool {
    INSTANCE.with(|slot| slot.borrow().as_ref().is_some_and(Instance::toggle))
}

/// Tear the minimap down. Safe to call repeatedly.
#[wasm_bindgen(js_name = destroyMinimap)]
pub fn destroy_minimap() {
    let instance = INSTANCE.with(|slot| slot.borrow_mut().take());
    if let Some(instance) = instance {
        instance.destroy();
    }
}

/// Initialize logging and mount once the document is ready.
#[wasm_bindgen(start)]
pub fn start() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging
    console_log::init_with_level(log::Level::Info).expect("Failed to initialize logger");

    log::info!("Starting live minimap (WASM)");

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        log::error!("No document to attach the minimap to");
        return;
    };

    let mount = || {
        if let Err(e) = mount_minimap(None) {
            log::error!("Failed to mount minimap: {:?}", e);
        }
    };

    if document.ready_state() == "loading" {
        let on_ready = Closure::once_into_js(mount);
        if let Err(e) = document.add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref()) {
            log::error!("Failed to wait for DOMContentLoaded: {:?}", e);
        }
    } else {
        mount();
    }
}
