//! Freehand point-stream smoothing.

use kurbo::Point;

/// Upper bound of the blend weight reached at smoothness 100.
pub const MAX_BLEND: f64 = 0.95;

/// Map a 0-100 smoothness setting to a 0-0.95 blend weight.
pub fn blend_factor(smoothness: f64) -> f64 {
    (smoothness.clamp(0.0, 100.0) / 100.0) * MAX_BLEND
}

/// Two-pass relaxation of a point stream.
///
/// Pass 1 pulls every interior point toward the midpoint of its neighbors by
/// the blend factor. Pass 2 replaces every interior point with the average of
/// itself and its successor. Endpoints never move, so a stroke keeps its
/// start and end under any setting.
pub fn smooth_points(points: &[Point], smoothness: f64) -> Vec<Point> {
    let factor = blend_factor(smoothness);
    if factor <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }

    let last = points.len() - 1;

    let mut relaxed = points.to_vec();
    for i in 1..last {
        let mid = points[i - 1].midpoint(points[i + 1]);
        relaxed[i] = points[i].lerp(mid, factor);
    }

    let mut averaged = relaxed.clone();
    for i in 1..last {
        averaged[i] = relaxed[i].midpoint(relaxed[i + 1]);
    }
    averaged
}
