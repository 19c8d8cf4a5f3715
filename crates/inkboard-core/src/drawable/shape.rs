//! Geometric shapes: rectangle, circle, triangle.

use super::SerializableColor;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

fn default_opacity() -> f64 {
    100.0
}

/// Kind of geometric shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rect,
    Circle,
    Triangle,
}

/// A shape defined by an origin and a signed extent.
///
/// `width`/`height` may be negative while the user drags up or left; every
/// consumer goes through [`Shape::rect`], which normalizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: SerializableColor,
    pub line_width: f64,
    /// Opacity in percent (0-100).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl Shape {
    /// Create a zero-extent shape template at `origin`.
    pub fn new(kind: ShapeKind, origin: Point, color: SerializableColor, line_width: f64) -> Self {
        Self {
            kind,
            x: origin.x,
            y: origin.y,
            width: 0.0,
            height: 0.0,
            color,
            line_width,
            opacity: default_opacity(),
        }
    }

    /// Stretch the shape so its far corner sits at `corner`.
    pub fn drag_to(&mut self, corner: Point) {
        self.width = corner.x - self.x;
        self.height = corner.y - self.y;
    }

    /// Rewrite origin and extent so width and height are non-negative.
    pub fn normalize(&mut self) {
        let rect = self.rect();
        self.x = rect.x0;
        self.y = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
    }

    /// Normalized rectangle (non-negative width and height).
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs()
    }

    /// The four corners of the normalized rectangle.
    pub fn corners(&self) -> [Point; 4] {
        let r = self.rect();
        [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ]
    }

    /// Bounds expanded by half the line width.
    pub fn bounds(&self) -> Rect {
        self.rect().inflate(self.line_width / 2.0, self.line_width / 2.0)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Scale origin and extent relative to `anchor`.
    pub fn scale_about(&mut self, anchor: Point, sx: f64, sy: f64) {
        self.x = anchor.x + (self.x - anchor.x) * sx;
        self.y = anchor.y + (self.y - anchor.y) * sy;
        self.width *= sx;
        self.height *= sy;
    }

    /// Distance from `point` to the normalized rectangle (0 inside).
    pub fn distance_to(&self, point: Point) -> f64 {
        let r = self.rect();
        let dx = (r.x0 - point.x).max(0.0).max(point.x - r.x1);
        let dy = (r.y0 - point.y).max(0.0).max(point.y - r.y1);
        dx.hypot(dy)
    }

    /// True when either dimension is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width.abs() < 1e-9 || self.height.abs() < 1e-9
    }
}
