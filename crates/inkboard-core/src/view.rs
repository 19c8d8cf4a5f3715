//! View transform for pan/zoom, with eased motion toward a target.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_SCALE: f64 = 0.1;
/// Maximum allowed zoom level.
pub const MAX_SCALE: f64 = 10.0;

/// Interpolation factor applied per tick while easing.
pub const EASE_FACTOR: f64 = 0.25;
/// Pan distance below which the view snaps to its target.
pub const PAN_EPSILON: f64 = 0.01;
/// Scale difference below which the view snaps to its target.
pub const SCALE_EPSILON: f64 = 1e-4;

/// Clamp a zoom level to the supported range.
pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

/// A pan/scale mapping from canvas space to screen space.
///
/// `screen = canvas * scale + pan`, both in physical pixels, Y down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub pan: Vec2,
    pub scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn new(pan: Vec2, scale: f64) -> Self {
        Self {
            pan,
            scale: clamp_scale(scale),
        }
    }

    /// Canvas-to-screen affine.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.scale)
    }

    /// Screen-to-canvas affine.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.pan)
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.transform() * canvas_point
    }

    /// Same view at `scale`, moved so `screen_point` keeps its canvas point.
    pub fn zoomed_at(&self, screen_point: Point, scale: f64) -> Self {
        let anchor = self.screen_to_canvas(screen_point);
        let scale = clamp_scale(scale);
        Self {
            pan: screen_point.to_vec2() - anchor.to_vec2() * scale,
            scale,
        }
    }

    /// Linear interpolation toward `other`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            pan: self.pan.lerp(other.pan, t),
            scale: self.scale + (other.scale - self.scale) * t,
        }
    }

    /// Whether `other` is within the easing snap thresholds.
    pub fn is_close(&self, other: &Self) -> bool {
        (self.pan - other.pan).hypot() <= PAN_EPSILON
            && (self.scale - other.scale).abs() <= SCALE_EPSILON
    }

    /// Orthographic projection to normalized device coordinates.
    ///
    /// Column-major 4x4 matrix mapping canvas space through this view into
    /// clip space for a viewport of `viewport` physical pixels. Y is flipped
    /// so canvas Y-down maps to NDC Y-up.
    pub fn projection(&self, viewport: Size) -> [[f32; 4]; 4] {
        let width = viewport.width.max(1.0);
        let height = viewport.height.max(1.0);
        let sx = 2.0 * self.scale / width;
        let sy = -2.0 * self.scale / height;
        let tx = 2.0 * self.pan.x / width - 1.0;
        let ty = 1.0 - 2.0 * self.pan.y / height;
        [
            [sx as f32, 0.0, 0.0, 0.0],
            [0.0, sy as f32, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [tx as f32, ty as f32, 0.0, 1.0],
        ]
    }
}

/// Current and target view; `current` eases toward `target` every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewState {
    pub current: ViewTransform,
    pub target: ViewTransform,
}

impl ViewState {
    /// A view resting at `view`.
    pub fn at(view: ViewTransform) -> Self {
        Self {
            current: view,
            target: view,
        }
    }

    /// Advance `current` toward `target`. Returns true while still moving.
    pub fn tick(&mut self) -> bool {
        if self.current.is_close(&self.target) {
            self.current = self.target;
            false
        } else {
            self.current = self.current.lerp(&self.target, EASE_FACTOR);
            true
        }
    }

    pub fn is_animating(&self) -> bool {
        self.current != self.target
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        self.current.screen_to_canvas(screen_point)
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.current.canvas_to_screen(canvas_point)
    }

    /// Pan by a screen-space delta with no easing lag.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.current.pan += delta;
        self.target.pan += delta;
    }

    /// Multiply the target zoom by `factor`, keeping `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        self.target = self
            .target
            .zoomed_at(screen_point, self.target.scale * factor);
    }

    /// Set the target so `anchor` (canvas space) sits under `screen_point`
    /// at `scale`.
    pub fn pin(&mut self, anchor: Point, screen_point: Point, scale: f64) {
        let scale = clamp_scale(scale);
        self.target = ViewTransform {
            pan: screen_point.to_vec2() - anchor.to_vec2() * scale,
            scale,
        };
    }

    /// Target a view that shows `bounds` centered in `viewport`.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.target = ViewTransform::default();
            return;
        }

        let padded_viewport = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );

        let scale_x = padded_viewport.width / bounds.width();
        let scale_y = padded_viewport.height / bounds.height();
        let scale = clamp_scale(scale_x.min(scale_y));

        let bounds_center = bounds.center();
        let viewport_center = Point::new(viewport.width / 2.0, viewport.height / 2.0);
        self.target = ViewTransform {
            pan: viewport_center.to_vec2() - bounds_center.to_vec2() * scale,
            scale,
        };
    }
}
