//! Freehand pen/highlighter stroke.

use super::SerializableColor;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

fn default_opacity() -> f64 {
    100.0
}

/// A freehand stroke (series of sample points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Sample points in canvas space.
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub line_width: f64,
    /// Opacity in percent (0-100).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Smoothness setting (0-100) the stroke was drawn with.
    #[serde(default)]
    pub smoothness: f64,
}

impl Stroke {
    /// Create a fully opaque, unsmoothed stroke.
    pub fn new(points: Vec<Point>, color: SerializableColor, line_width: f64) -> Self {
        Self {
            points,
            color,
            line_width,
            opacity: default_opacity(),
            smoothness: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Tight bounds of the sample points, without line width.
    pub fn point_bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |rect, p| {
                rect.union_pt(*p)
            })
    }

    /// Bounds expanded by half the line width.
    pub fn bounds(&self) -> Rect {
        if self.points.is_empty() {
            return Rect::ZERO;
        }
        self.point_bounds().inflate(self.line_width / 2.0, self.line_width / 2.0)
    }

    pub fn translate(&mut self, delta: Vec2) {
        for point in &mut self.points {
            *point += delta;
        }
    }

    /// Scale every point relative to `anchor`.
    pub fn scale_about(&mut self, anchor: Point, sx: f64, sy: f64) {
        for point in &mut self.points {
            point.x = anchor.x + (point.x - anchor.x) * sx;
            point.y = anchor.y + (point.y - anchor.y) * sy;
        }
    }

    /// Distance from `point` to the nearest sample point.
    pub fn nearest_sample_distance(&self, point: Point) -> Option<f64> {
        self.points
            .iter()
            .map(|p| p.distance(point))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// A stroke needs at least two distinct points to produce a ribbon.
    pub fn is_degenerate(&self) -> bool {
        match self.points.first() {
            Some(first) => self.points.iter().all(|p| p.distance(*first) < 1e-9),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Stroke {
        Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0), Point::new(20.0, 0.0)],
            SerializableColor::black(),
            4.0,
        )
    }

    #[test]
    fn test_bounds_include_half_width() {
        let bounds = line().bounds();
        assert!((bounds.x0 - -2.0).abs() < f64::EPSILON);
        assert!((bounds.y0 - -2.0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 22.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_bounds() {
        let stroke = Stroke::new(Vec::new(), SerializableColor::black(), 2.0);
        assert_eq!(stroke.bounds(), Rect::ZERO);
        assert!(stroke.is_degenerate());
    }

    #[test]
    fn test_scale_about_anchor() {
        let mut stroke = line();
        stroke.scale_about(Point::new(0.0, 0.0), 2.0, 1.0);
        assert_eq!(stroke.points[1], Point::new(20.0, 5.0));
        assert_eq!(stroke.points[2], Point::new(40.0, 0.0));
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let mut stroke = line();
        stroke.points = vec![Point::new(3.0, 3.0), Point::new(3.0, 3.0)];
        assert!(stroke.is_degenerate());
        assert!(!line().is_degenerate());
    }

    #[test]
    fn test_missing_opacity_defaults_to_full() {
        let stroke: Stroke = serde_json::from_str(
            r##"{"points":[{"x":0,"y":0}],"color":"#000000","lineWidth":3}"##,
        )
        .unwrap();
        assert!((stroke.opacity - 100.0).abs() < f64::EPSILON);
        assert!((stroke.smoothness).abs() < f64::EPSILON);
    }
}
