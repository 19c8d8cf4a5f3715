//! Drawable definitions for the ink canvas.
//!
//! A [`Drawable`] is the unit of undoable content: either a freehand
//! [`Stroke`] (pen/highlighter) or a geometric [`Shape`]. Drawables are pure
//! data plus two transient fields that never reach storage: the eraser
//! preview flag and the per-drawable [`MeshState`].

mod shape;
mod stroke;

pub use shape::{Shape, ShapeKind};
pub use stroke::Stroke;

use crate::mesh::{MeshHandle, MeshState};
use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a drawable.
pub type DrawableId = Uuid;

/// Serializable color representation (RGBA8), stored as `#rrggbb[aa]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Error returned for a color string that is not `#rgb`, `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color: {0}")]
pub struct ColorParseError(pub String);

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// Parse a hex color string (`#rgb`, `#rrggbb`, `#rrggbbaa`).
    pub fn from_hex(color: &str) -> Result<Self, ColorParseError> {
        let invalid = || ColorParseError(color.to_string());
        let hex = color.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };

        match hex.len() {
            3 => {
                // #rgb -> #rrggbb
                let r = channel(0..1)? * 17;
                let g = channel(1..2)? * 17;
                let b = channel(2..3)? * 17;
                Ok(Self::new(r, g, b, 255))
            }
            6 => Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Ok(Self::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(invalid()),
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Normalized RGBA with the alpha channel multiplied by `alpha_scale`.
    pub fn to_rgba_f32(self, alpha_scale: f64) -> [f32; 4] {
        let alpha = (self.a as f64 / 255.0) * alpha_scale.clamp(0.0, 1.0);
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            alpha as f32,
        ]
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Opacity multiplier applied while a drawable is marked by the eraser.
pub const ERASE_PREVIEW_ALPHA: f64 = 0.3;

/// Geometry and style of a drawable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DrawableBody {
    Stroke(Stroke),
    Shape(Shape),
}

/// A stroke or shape on a layer.
///
/// Geometry and style are only reachable mutably through methods that
/// invalidate the mesh, so a stale GPU mesh can never be drawn for edited
/// geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drawable {
    id: DrawableId,
    #[serde(flatten)]
    body: DrawableBody,
    /// Live eraser preview; never persisted.
    #[serde(skip)]
    is_erasing: bool,
    #[serde(skip)]
    mesh: MeshState,
}

impl PartialEq for Drawable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.body == other.body
    }
}

impl Drawable {
    /// Create a drawable with a fresh id.
    pub fn new(body: DrawableBody) -> Self {
        Self::with_id(Uuid::new_v4(), body)
    }

    /// Create a drawable with a specific id (storage, tests).
    pub fn with_id(id: DrawableId, body: DrawableBody) -> Self {
        Self {
            id,
            body,
            is_erasing: false,
            mesh: MeshState::Absent,
        }
    }

    pub fn stroke(stroke: Stroke) -> Self {
        Self::new(DrawableBody::Stroke(stroke))
    }

    pub fn shape(shape: Shape) -> Self {
        Self::new(DrawableBody::Shape(shape))
    }

    pub fn id(&self) -> DrawableId {
        self.id
    }

    pub fn body(&self) -> &DrawableBody {
        &self.body
    }

    /// Deep copy for history: same id and geometry, no mesh, no erase mark.
    pub fn snapshot(&self) -> Self {
        Self::with_id(self.id, self.body.clone())
    }

    /// Mutate geometry or style. Always invalidates the mesh.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut DrawableBody) -> R) -> R {
        let result = f(&mut self.body);
        self.invalidate_mesh();
        result
    }

    pub fn is_erasing(&self) -> bool {
        self.is_erasing
    }

    /// Set the eraser preview flag; invalidates the mesh on change since the
    /// preview alpha is baked into vertex colors.
    pub fn set_erasing(&mut self, erasing: bool) {
        if self.is_erasing != erasing {
            self.is_erasing = erasing;
            self.invalidate_mesh();
        }
    }

    pub fn mesh(&self) -> &MeshState {
        &self.mesh
    }

    /// Mark the mesh as needing a rebuild.
    pub fn invalidate_mesh(&mut self) {
        self.mesh.invalidate();
    }

    /// Detach the GPU mesh handle (if any) so the owner can release it.
    pub fn take_mesh(&mut self) -> Option<MeshHandle> {
        self.mesh.take()
    }

    pub(crate) fn mesh_mut(&mut self) -> &mut MeshState {
        &mut self.mesh
    }

    pub fn color(&self) -> SerializableColor {
        match &self.body {
            DrawableBody::Stroke(s) => s.color,
            DrawableBody::Shape(s) => s.color,
        }
    }

    pub fn set_color(&mut self, color: SerializableColor) {
        self.edit(|body| match body {
            DrawableBody::Stroke(s) => s.color = color,
            DrawableBody::Shape(s) => s.color = color,
        });
    }

    pub fn line_width(&self) -> f64 {
        match &self.body {
            DrawableBody::Stroke(s) => s.line_width,
            DrawableBody::Shape(s) => s.line_width,
        }
    }

    /// Opacity in percent (0-100).
    pub fn opacity(&self) -> f64 {
        match &self.body {
            DrawableBody::Stroke(s) => s.opacity,
            DrawableBody::Shape(s) => s.opacity,
        }
    }

    /// Bounding box expanded by half the line width.
    pub fn bounds(&self) -> Rect {
        match &self.body {
            DrawableBody::Stroke(s) => s.bounds(),
            DrawableBody::Shape(s) => s.bounds(),
        }
    }

    /// Translate all geometry by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        self.edit(|body| match body {
            DrawableBody::Stroke(s) => s.translate(delta),
            DrawableBody::Shape(s) => s.translate(delta),
        });
    }

    /// Scale geometry about `anchor` and scale line width by
    /// `min(|sx|, |sy|)`.
    pub fn scale_about(&mut self, anchor: Point, sx: f64, sy: f64) {
        let width_scale = sx.abs().min(sy.abs());
        self.edit(|body| match body {
            DrawableBody::Stroke(s) => {
                s.scale_about(anchor, sx, sy);
                s.line_width *= width_scale;
            }
            DrawableBody::Shape(s) => {
                s.scale_about(anchor, sx, sy);
                s.line_width *= width_scale;
            }
        });
    }

    /// Whether the eraser at `point` with `radius` touches this drawable.
    pub fn touched_by_eraser(&self, point: Point, radius: f64) -> bool {
        match &self.body {
            DrawableBody::Stroke(s) => s
                .nearest_sample_distance(point)
                .is_some_and(|d| d <= radius + s.line_width / 2.0),
            DrawableBody::Shape(s) => s.distance_to(point) <= radius + s.line_width / 2.0,
        }
    }

    /// Whether the drawable has no renderable extent.
    pub fn is_degenerate(&self) -> bool {
        match &self.body {
            DrawableBody::Stroke(s) => s.is_degenerate(),
            DrawableBody::Shape(s) => s.is_degenerate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stroke() -> Drawable {
        Drawable::stroke(Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            SerializableColor::new(255, 0, 0, 255),
            4.0,
        ))
    }

    #[test]
    fn test_hex_roundtrip() {
        let color = SerializableColor::from_hex("#1a2b3c").unwrap();
        assert_eq!(color, SerializableColor::new(0x1a, 0x2b, 0x3c, 255));
        assert_eq!(color.to_hex(), "#1a2b3c");

        let short = SerializableColor::from_hex("#f00").unwrap();
        assert_eq!(short, SerializableColor::new(255, 0, 0, 255));

        let translucent = SerializableColor::from_hex("#00000080").unwrap();
        assert_eq!(translucent.a, 128);
        assert_eq!(translucent.to_hex(), "#00000080");
    }

    #[test]
    fn test_invalid_hex() {
        assert!(SerializableColor::from_hex("red").is_err());
        assert!(SerializableColor::from_hex("#12345").is_err());
        assert!(SerializableColor::from_hex("#gggggg").is_err());
    }

    #[test]
    fn test_snapshot_drops_transient_state() {
        let mut drawable = sample_stroke();
        drawable.set_erasing(true);
        *drawable.mesh_mut() = MeshState::Built(MeshHandle::from_raw(7));

        let snapshot = drawable.snapshot();
        assert_eq!(snapshot, drawable);
        assert!(!snapshot.is_erasing());
        assert!(snapshot.mesh().is_absent());
    }

    #[test]
    fn test_clone_never_shares_mesh() {
        let mut drawable = sample_stroke();
        *drawable.mesh_mut() = MeshState::Built(MeshHandle::from_raw(3));
        let copy = drawable.clone();
        assert!(copy.mesh().is_absent());
        assert_eq!(drawable.mesh().handle(), Some(MeshHandle::from_raw(3)));
    }

    #[test]
    fn test_edit_invalidates_mesh() {
        let mut drawable = sample_stroke();
        *drawable.mesh_mut() = MeshState::Built(MeshHandle::from_raw(1));
        drawable.translate(Vec2::new(5.0, 0.0));
        assert!(matches!(drawable.mesh(), MeshState::Stale(_)));
        assert!(drawable.mesh().needs_build());
    }

    #[test]
    fn test_scale_keeps_width_proportional() {
        let mut drawable = sample_stroke();
        drawable.scale_about(Point::ZERO, 2.0, 1.0);
        assert!((drawable.line_width() - 4.0).abs() < f64::EPSILON);

        drawable.scale_about(Point::ZERO, 0.5, 3.0);
        assert!((drawable.line_width() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serialization_excludes_transient_fields() {
        let mut drawable = sample_stroke();
        drawable.set_erasing(true);
        let json = serde_json::to_value(&drawable).unwrap();
        assert_eq!(json["type"], "stroke");
        assert_eq!(json["color"], "#ff0000");
        assert_eq!(json["lineWidth"], 4.0);
        assert!(json.get("isErasing").is_none());
        assert!(json.get("mesh").is_none());

        let back: Drawable = serde_json::from_value(json).unwrap();
        assert_eq!(back, drawable);
        assert!(!back.is_erasing());
        assert!(back.mesh().is_absent());
    }

    #[test]
    fn test_eraser_touch_uses_half_width() {
        let drawable = sample_stroke();
        // Nearest sample (10, 0) is 7 away; radius 5 + half width 2 reaches it.
        assert!(drawable.touched_by_eraser(Point::new(17.0, 0.0), 5.0));
        assert!(!drawable.touched_by_eraser(Point::new(17.5, 0.0), 5.0));
    }
}
