//! Live Minimap Core Library
//!
//! Platform-agnostic model for the live page minimap: the coordinate
//! mapper, the host document abstraction, element sampling, highlight
//! detection, viewport tracking and render scheduling.

pub mod config;
pub mod dom;
pub mod geometry;
pub mod highlight;
pub mod sampler;
pub mod scheduler;
pub mod viewport;

pub use config::{ConfigError, MinimapConfig};
pub use dom::{ComputedStyle, Document, ElementKind, MutationRecord, PageMetrics, RawStyle, StaticDocument, StaticElement, StyleError};
pub use geometry::CoordinateMapper;
pub use highlight::{HighlightRegion, HighlightSource, HighlightStyle};
pub use sampler::{Border, Fidelity, Sample, SampleError, TextRun};
pub use scheduler::{Action, Channel, ManualTimers, RenderScheduler, TimerId, TimerQueue, Trigger};
pub use viewport::ViewportIndicator;
