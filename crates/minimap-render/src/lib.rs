//! Live Minimap Render Library
//!
//! Drawing for the live page minimap: the [`Surface`] abstraction over a 2D
//! canvas, the [`Painter`] that turns samples and highlight regions into
//! draw calls, and the [`RenderPipeline`] that runs one render pass.

mod painter;
mod pipeline;
pub mod raster;
mod surface;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use painter::{LineRng, Painter, text_lines};
pub use pipeline::{PassReport, RenderPipeline};
pub use raster::{RasterImage, rasterize};
pub use surface::{DisplayList, DrawCommand, RenderError, RenderResult, Surface};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::VelloSurface;

#[cfg(all(feature = "vello-renderer", not(target_arch = "wasm32")))]
pub use vello_impl::VelloRasterizer;
