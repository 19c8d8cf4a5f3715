//! Geometry tessellation: drawables into triangle meshes.
//!
//! Strokes become a ribbon of two vertices per sample point; shapes become
//! filled triangles. Colors are baked into vertices, including the eraser
//! preview dimming, so a mesh has to be rebuilt whenever style changes.

use crate::drawable::{
    Drawable, DrawableBody, ERASE_PREVIEW_ALPHA, SerializableColor, Shape, ShapeKind, Stroke,
};
use bytemuck::{Pod, Zeroable};
use kurbo::{Point, Vec2};
use std::f64::consts::TAU;

/// Number of rim segments used for circles.
pub const CIRCLE_SEGMENTS: u32 = 32;

/// Normals shorter than this fall back to [`FALLBACK_NORMAL`].
const MIN_NORMAL_LENGTH: f64 = 1e-9;
const FALLBACK_NORMAL: Vec2 = Vec2::new(0.0, 1.0);

/// GPU vertex: canvas-space position and straight RGBA.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(point: Point, color: [f32; 4]) -> Self {
        Self {
            position: [point.x as f32, point.y as f32],
            color,
        }
    }
}

/// A triangle-list mesh with indices local to this mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Vertex color for a drawable: `opacity%`, dimmed while erase-marked.
fn vertex_color(color: SerializableColor, opacity: f64, erasing: bool) -> [f32; 4] {
    let preview = if erasing { ERASE_PREVIEW_ALPHA } else { 1.0 };
    color.to_rgba_f32(opacity / 100.0 * preview)
}

/// Rotate 90 degrees and normalize, with a fixed fallback for zero input.
fn unit_normal(direction: Vec2) -> Vec2 {
    let normal = Vec2::new(-direction.y, direction.x);
    let len = normal.hypot();
    if len < MIN_NORMAL_LENGTH {
        FALLBACK_NORMAL
    } else {
        normal / len
    }
}

/// Tessellate a stroke into a ribbon: `2N` vertices and `6(N-1)` indices.
///
/// Returns an empty mesh for fewer than two points.
pub fn tessellate_stroke(stroke: &Stroke, erasing: bool) -> Mesh {
    let points = &stroke.points;
    let n = points.len();
    if n < 2 {
        return Mesh::default();
    }

    let color = vertex_color(stroke.color, stroke.opacity, erasing);
    let half_width = stroke.line_width / 2.0;

    let mut vertices = Vec::with_capacity(n * 2);
    for i in 0..n {
        let direction = if i == 0 {
            points[1] - points[0]
        } else if i == n - 1 {
            points[n - 1] - points[n - 2]
        } else {
            points[i + 1] - points[i - 1]
        };
        let offset = unit_normal(direction) * half_width;
        vertices.push(Vertex::new(points[i] + offset, color));
        vertices.push(Vertex::new(points[i] - offset, color));
    }

    let mut indices = Vec::with_capacity((n - 1) * 6);
    for i in 0..(n as u32 - 1) {
        let base = i * 2;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 1, base + 3, base + 2]);
    }

    Mesh { vertices, indices }
}

/// Tessellate a filled shape. Zero-area shapes produce an empty mesh.
pub fn tessellate_shape(shape: &Shape, erasing: bool) -> Mesh {
    if shape.is_degenerate() {
        return Mesh::default();
    }
    let color = vertex_color(shape.color, shape.opacity, erasing);
    let rect = shape.rect();

    match shape.kind {
        ShapeKind::Rect => Mesh {
            vertices: shape.corners().map(|p| Vertex::new(p, color)).to_vec(),
            indices: vec![0, 1, 2, 0, 2, 3],
        },
        ShapeKind::Circle => {
            let center = rect.center();
            let (rx, ry) = (rect.width() / 2.0, rect.height() / 2.0);
            let mut vertices = Vec::with_capacity(CIRCLE_SEGMENTS as usize + 1);
            vertices.push(Vertex::new(center, color));
            for i in 0..CIRCLE_SEGMENTS {
                let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
                let rim = Point::new(center.x + rx * angle.cos(), center.y + ry * angle.sin());
                vertices.push(Vertex::new(rim, color));
            }
            let indices = (0..CIRCLE_SEGMENTS)
                .flat_map(|i| [0, 1 + i, 1 + (i + 1) % CIRCLE_SEGMENTS])
                .collect();
            Mesh { vertices, indices }
        }
        ShapeKind::Triangle => {
            let apex = Point::new(rect.center().x, rect.y0);
            Mesh {
                vertices: vec![
                    Vertex::new(apex, color),
                    Vertex::new(Point::new(rect.x1, rect.y1), color),
                    Vertex::new(Point::new(rect.x0, rect.y1), color),
                ],
                indices: vec![0, 1, 2],
            }
        }
    }
}

/// Tessellate any drawable, honoring its eraser preview flag.
pub fn tessellate(drawable: &Drawable) -> Mesh {
    match drawable.body() {
        DrawableBody::Stroke(stroke) => tessellate_stroke(stroke, drawable.is_erasing()),
        DrawableBody::Shape(shape) => tessellate_shape(shape, drawable.is_erasing()),
    }
}
