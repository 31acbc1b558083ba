//! The on-page panel hosting the minimap canvas and viewport indicator.

use minimap_core::viewport::ViewportIndicator;
use thiserror::Error;

/// Element id of the mounted panel. Its presence marks a live instance.
pub const PANEL_ID: &str = "live-minimap";

/// Mount failures.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("A minimap is already mounted in this document")]
    AlreadyMounted,
    #[error("Document has no body to attach to")]
    NoBody,
    #[error("Host error: {0}")]
    Host(String),
}

/// Host side of the panel: the container, the indicator overlay and the
/// single-instance guard.
pub trait Panel {
    /// Insert the panel into the page.
    ///
    /// Fails with [`MountError::AlreadyMounted`] if another instance holds
    /// the document.
    fn attach(&mut self) -> Result<(), MountError>;

    /// Show or hide the whole panel.
    fn set_visible(&mut self, visible: bool);

    /// Move the viewport indicator overlay.
    fn place_indicator(&mut self, indicator: ViewportIndicator);

    /// Remove the panel from the page. Safe to call more than once.
    fn detach(&mut self);
}
