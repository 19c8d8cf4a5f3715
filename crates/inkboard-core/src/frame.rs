//! Per-tick render input handed from the session to a renderer.

use crate::canvas::Layer;
use crate::drawable::Drawable;
use crate::mesh::MeshHandle;
use crate::overlay::{LaserTrail, OverlayStyle, build_overlay};
use crate::tessellate::Vertex;
use crate::view::ViewTransform;
use kurbo::{Point, Rect, Size};

/// Everything a renderer needs for one tick.
///
/// Layers are borrowed mutably so the buffer manager can record built
/// meshes; nothing else about them may change while a frame is alive.
pub struct Frame<'a> {
    /// Current (eased) view.
    pub view: ViewTransform,
    /// Viewport size in physical pixels.
    pub viewport: Size,
    pub layers: &'a mut [Layer],
    /// Mesh handles to release before drawing.
    pub retired: Vec<MeshHandle>,
    /// The drawable under construction, re-tessellated every tick.
    pub in_progress: Option<&'a Drawable>,
    pub lasso: &'a [Point],
    pub selection_box: Option<Rect>,
    pub laser: &'a LaserTrail,
}

impl Frame<'_> {
    /// Canvas-to-clip projection for this frame.
    pub fn projection(&self) -> [[f32; 4]; 4] {
        self.view.projection(self.viewport)
    }

    /// Overlay line list (lasso, selection box, laser trail).
    pub fn overlay(&self, style: &OverlayStyle) -> Vec<Vertex> {
        build_overlay(self.lasso, self.selection_box, self.laser, style)
    }
}
