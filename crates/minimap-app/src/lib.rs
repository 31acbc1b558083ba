//! Live Minimap Application
//!
//! The controller that ties a host document, a canvas surface, a timer
//! queue and the on-page panel into one mounted minimap, plus the browser
//! entry point and the native snapshot renderer.

mod minimap;
mod panel;
pub mod snapshot;

pub use minimap::{Minimap, MinimapError, MinimapResult};
pub use panel::{MountError, PANEL_ID, Panel};

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{CanvasSurface, WebDocument, WebPanel, WebTimers, destroy_minimap, mount_minimap, start, toggle_minimap};
