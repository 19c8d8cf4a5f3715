//! Renderer trait abstraction.

use inkboard_core::frame::Frame;
use inkboard_core::overlay::OverlayStyle;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Colors a renderer clears and draws overlays with.
#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    pub background_color: Color,
    pub overlay: OverlayStyle,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background_color: Color::from_rgba8(250, 250, 250, 255),
            overlay: OverlayStyle::default(),
        }
    }
}

impl RenderStyle {
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_overlay(mut self, overlay: OverlayStyle) -> Self {
        self.overlay = overlay;
        self
    }
}

/// Trait for rendering backends.
///
/// `render` is called once per tick with the session's frame. It releases
/// retired meshes, builds any missing ones, then draws visible layers back
/// to front, the in-progress drawable, and finally the overlay lines.
pub trait Renderer {
    /// What a frame is drawn into.
    type Target: ?Sized;

    fn render(&mut self, frame: &mut Frame<'_>, target: &Self::Target) -> RenderResult<()>;

    fn style(&self) -> &RenderStyle;

    /// Get the background color (for clearing).
    fn background_color(&self) -> Color {
        self.style().background_color
    }

    /// Release every device resource held for drawables.
    fn release_all(&mut self);
}
