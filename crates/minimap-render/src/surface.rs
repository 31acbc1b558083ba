//! Canvas surface abstraction.

use kurbo::{Rect, Size};
use peniko::Color;
use thiserror::Error;

/// Render errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// A 2D drawing surface with a fixed logical size.
///
/// The browser backend wraps a `CanvasRenderingContext2d`; [`DisplayList`]
/// records calls for tests and offline rasterization.
pub trait Surface {
    /// Logical size in canvas pixels.
    fn size(&self) -> Size;

    /// Change the logical size. Clears the surface.
    fn resize(&mut self, size: Size);

    /// Erase everything.
    fn clear(&mut self);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Stroke the outline of `rect`, centered on its edges.
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64);
}

/// One recorded drawing call.
#[derive(Debug, Clone, Copy)]
pub enum DrawCommand {
    Fill { rect: Rect, color: Color },
    Stroke { rect: Rect, color: Color, width: f64 },
}

impl DrawCommand {
    pub fn rect(&self) -> Rect {
        match self {
            DrawCommand::Fill { rect, .. } | DrawCommand::Stroke { rect, .. } => *rect,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            DrawCommand::Fill { color, .. } | DrawCommand::Stroke { color, .. } => *color,
        }
    }
}

/// Surface that records the calls made since the last clear.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    /// Calls made since the last clear, in paint order.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Recorded fills.
    pub fn fills(&self) -> impl Iterator<Item = (Rect, Color)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Fill { rect, color } => Some((*rect, *color)),
            DrawCommand::Stroke { .. } => None,
        })
    }

    /// Recorded strokes.
    pub fn strokes(&self) -> impl Iterator<Item = (Rect, Color, f64)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Stroke { rect, color, width } => Some((*rect, *color, *width)),
            DrawCommand::Fill { .. } => None,
        })
    }
}

impl Surface for DisplayList {
    fn size(&self) -> Size {
        self.size
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        self.commands.clear();
    }

    fn clear(&mut self) {
        self.commands.clear();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::Fill { rect, color });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f64) {
        self.commands.push(DrawCommand::Stroke { rect, color, width });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_list_records_in_order() {
        let mut list = DisplayList::new(Size::new(180.0, 300.0));
        list.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        list.stroke_rect(Rect::new(1.0, 1.0, 5.0, 5.0), Color::BLACK, 0.5);

        assert_eq!(list.commands().len(), 2);
        assert_eq!(list.fills().count(), 1);
        let (_, _, width) = list.strokes().next().unwrap();
        assert!((width - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clear_and_resize_drop_commands() {
        let mut list = DisplayList::new(Size::new(180.0, 300.0));
        list.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        list.clear();
        assert!(list.commands().is_empty());

        list.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        list.resize(Size::new(180.0, 120.0));
        assert!(list.commands().is_empty());
        assert_eq!(list.size(), Size::new(180.0, 120.0));
    }
}
