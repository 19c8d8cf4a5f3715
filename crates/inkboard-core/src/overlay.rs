//! Transient overlay geometry: lasso outline, selection box, laser trail.
//!
//! Overlays are rebuilt as a line list on every tick and never cached.

use crate::tessellate::Vertex;
use kurbo::{Point, Rect};
use std::collections::VecDeque;
use std::time::Duration;

// Use web_time for WASM compatibility
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// How long a laser point stays on screen.
pub const LASER_FADE: Duration = Duration::from_millis(500);

/// A laser pointer sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserPoint {
    pub position: Point,
    pub captured_at: Instant,
}

/// Timestamped laser trail, oldest first.
#[derive(Debug, Clone, Default)]
pub struct LaserTrail {
    points: VecDeque<LaserPoint>,
}

impl LaserTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, position: Point, captured_at: Instant) {
        self.points.push_back(LaserPoint {
            position,
            captured_at,
        });
    }

    /// Drop points older than [`LASER_FADE`] relative to `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(front) = self.points.front() {
            if now.saturating_duration_since(front.captured_at) > LASER_FADE {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn positions(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().map(|p| p.position)
    }
}

/// Overlay line colors (straight RGBA).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub lasso: [f32; 4],
    pub selection: [f32; 4],
    pub laser: [f32; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            lasso: [0.4, 0.4, 0.4, 1.0],
            selection: [0.23, 0.51, 0.96, 1.0], // Blue
            laser: [0.94, 0.27, 0.27, 1.0],     // Red
        }
    }
}

fn push_segment(lines: &mut Vec<Vertex>, a: Point, b: Point, color: [f32; 4]) {
    lines.push(Vertex::new(a, color));
    lines.push(Vertex::new(b, color));
}

fn push_polyline(lines: &mut Vec<Vertex>, points: &[Point], closed: bool, color: [f32; 4]) {
    for pair in points.windows(2) {
        push_segment(lines, pair[0], pair[1], color);
    }
    if closed && points.len() > 2 {
        push_segment(lines, points[points.len() - 1], points[0], color);
    }
}

/// Build the overlay line list in canvas space.
pub fn build_overlay(
    lasso: &[Point],
    selection_box: Option<Rect>,
    laser: &LaserTrail,
    style: &OverlayStyle,
) -> Vec<Vertex> {
    let mut lines = Vec::new();

    push_polyline(&mut lines, lasso, true, style.lasso);

    if let Some(rect) = selection_box {
        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ];
        push_polyline(&mut lines, &corners, true, style.selection);
    }

    let trail: Vec<Point> = laser.positions().collect();
    push_polyline(&mut lines, &trail, false, style.laser);

    lines
}
