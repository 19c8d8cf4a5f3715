//! Selection, resize handles, and move/resize of selected drawables.

use crate::canvas::{Layer, LayerId, union_bounds};
use crate::drawable::{Drawable, DrawableBody, DrawableId};
use crate::history::HistoryAction;
use kurbo::{Point, Rect, Vec2};

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 10.0;
/// Handle hit radius in screen pixels, independent of zoom.
pub const HANDLE_HIT_TOLERANCE: f64 = 12.0;

/// Box dimensions below this keep their axis scale at 1.
const MIN_SCALE_DENOMINATOR: f64 = 1e-6;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Type of resize handle on the selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
}

impl HandleKind {
    /// Point on `rect` this handle sits on.
    pub fn position(self, rect: Rect) -> Point {
        let center = rect.center();
        match self {
            HandleKind::Corner(Corner::TopLeft) => Point::new(rect.x0, rect.y0),
            HandleKind::Corner(Corner::TopRight) => Point::new(rect.x1, rect.y0),
            HandleKind::Corner(Corner::BottomLeft) => Point::new(rect.x0, rect.y1),
            HandleKind::Corner(Corner::BottomRight) => Point::new(rect.x1, rect.y1),
            HandleKind::Edge(Edge::Top) => Point::new(center.x, rect.y0),
            HandleKind::Edge(Edge::Right) => Point::new(rect.x1, center.y),
            HandleKind::Edge(Edge::Bottom) => Point::new(center.x, rect.y1),
            HandleKind::Edge(Edge::Left) => Point::new(rect.x0, center.y),
        }
    }

    /// The handle on the opposite side/corner.
    pub fn opposite(self) -> Self {
        match self {
            HandleKind::Corner(Corner::TopLeft) => HandleKind::Corner(Corner::BottomRight),
            HandleKind::Corner(Corner::TopRight) => HandleKind::Corner(Corner::BottomLeft),
            HandleKind::Corner(Corner::BottomLeft) => HandleKind::Corner(Corner::TopRight),
            HandleKind::Corner(Corner::BottomRight) => HandleKind::Corner(Corner::TopLeft),
            HandleKind::Edge(Edge::Top) => HandleKind::Edge(Edge::Bottom),
            HandleKind::Edge(Edge::Right) => HandleKind::Edge(Edge::Left),
            HandleKind::Edge(Edge::Bottom) => HandleKind::Edge(Edge::Top),
            HandleKind::Edge(Edge::Left) => HandleKind::Edge(Edge::Right),
        }
    }

    /// Which axes this handle resizes: (x, y).
    pub fn axes(self) -> (bool, bool) {
        match self {
            HandleKind::Corner(_) => (true, true),
            HandleKind::Edge(Edge::Left | Edge::Right) => (true, false),
            HandleKind::Edge(Edge::Top | Edge::Bottom) => (false, true),
        }
    }
}

/// A selection handle with its position and type.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    /// Position in canvas coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a point (canvas coordinates) hits this handle.
    /// `tolerance` must already be divided by the view scale.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Corner and edge handles of a selection box.
pub fn handles(rect: Rect) -> Vec<Handle> {
    [
        HandleKind::Corner(Corner::TopLeft),
        HandleKind::Corner(Corner::TopRight),
        HandleKind::Corner(Corner::BottomLeft),
        HandleKind::Corner(Corner::BottomRight),
        HandleKind::Edge(Edge::Top),
        HandleKind::Edge(Edge::Right),
        HandleKind::Edge(Edge::Bottom),
        HandleKind::Edge(Edge::Left),
    ]
    .into_iter()
    .map(|kind| Handle::new(kind.position(rect), kind))
    .collect()
}

/// Find which handle (if any) is hit; corners win over edges.
pub fn hit_test_handles(rect: Rect, point: Point, tolerance: f64) -> Option<HandleKind> {
    handles(rect)
        .into_iter()
        .find(|handle| handle.hit_test(point, tolerance))
        .map(|handle| handle.kind)
}

/// Even-odd ray casting point-in-polygon test against a closed path.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Whether a lasso polygon selects a drawable.
///
/// Strokes: any sample point inside. Shapes: any corner of the normalized
/// rectangle inside (a bounding-box approximation).
pub fn lasso_hits(drawable: &Drawable, polygon: &[Point]) -> bool {
    match drawable.body() {
        DrawableBody::Stroke(stroke) => stroke
            .points
            .iter()
            .any(|p| point_in_polygon(*p, polygon)),
        DrawableBody::Shape(shape) => shape
            .corners()
            .iter()
            .any(|p| point_in_polygon(*p, polygon)),
    }
}

/// Ids of all drawables in `layer` selected by the lasso, in layer order.
pub fn lasso_select(layer: &Layer, polygon: &[Point]) -> Vec<DrawableId> {
    layer
        .drawables()
        .iter()
        .filter(|d| lasso_hits(d, polygon))
        .map(Drawable::id)
        .collect()
}

/// Per-axis scale factors for a resize.
///
/// An axis whose old dimension is near zero keeps scale 1.
pub fn scale_factors(old: Vec2, new: Vec2) -> (f64, f64) {
    let factor = |old: f64, new: f64| {
        if old.abs() < MIN_SCALE_DENOMINATOR {
            1.0
        } else {
            new / old
        }
    };
    (factor(old.x, new.x), factor(old.y, new.y))
}

/// Current selection on the active layer.
///
/// `selection_box` is derived from the selected drawables' bounds and kept
/// alongside the ids for hit testing and overlay drawing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: Vec<DrawableId>,
    selection_box: Option<Rect>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[DrawableId] {
        &self.ids
    }

    pub fn contains(&self, id: DrawableId) -> bool {
        self.ids.contains(&id)
    }

    pub fn selection_box(&self) -> Option<Rect> {
        self.selection_box
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.selection_box = None;
    }

    /// Replace the selection, keeping only ids present in `layer`.
    pub fn set(&mut self, ids: impl IntoIterator<Item = DrawableId>, layer: &Layer) {
        self.ids.clear();
        for id in ids {
            if layer.contains(id) && !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
        self.refresh(layer);
    }

    /// Drop ids no longer in `layer` and recompute the box.
    pub fn refresh(&mut self, layer: &Layer) {
        self.ids.retain(|id| layer.contains(*id));
        self.selection_box = union_bounds(self.drawables(layer));
    }

    /// Selected drawables in layer order.
    pub fn drawables<'a>(&'a self, layer: &'a Layer) -> impl Iterator<Item = &'a Drawable> + 'a {
        layer
            .drawables()
            .iter()
            .filter(move |d| self.ids.contains(&d.id()))
    }

    /// Deep copies of the selected drawables, in layer order.
    pub fn snapshot(&self, layer: &Layer) -> Vec<Drawable> {
        self.drawables(layer).map(Drawable::snapshot).collect()
    }

    /// Whether `point` lies inside the selection box.
    pub fn box_contains(&self, point: Point) -> bool {
        self.selection_box.is_some_and(|rect| rect.contains(point))
    }

    /// Handle under `point`; `tolerance` in canvas units.
    pub fn hit_handle(&self, point: Point, tolerance: f64) -> Option<HandleKind> {
        hit_test_handles(self.selection_box?, point, tolerance)
    }
}

/// How a transform gesture changes the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformKind {
    Move,
    Resize(HandleKind),
}

/// An in-flight move or resize of the selection.
///
/// Each update re-derives geometry from the snapshot taken at gesture
/// start, so rounding never accumulates across frames.
#[derive(Debug, Clone)]
pub struct TransformGesture {
    pub kind: TransformKind,
    pub layer_id: LayerId,
    pub start: Point,
    before: Vec<Drawable>,
    original_box: Rect,
}

impl TransformGesture {
    /// Start a gesture on the current selection. Returns `None` for an
    /// empty selection.
    pub fn begin(
        kind: TransformKind,
        layer: &Layer,
        selection: &Selection,
        start: Point,
    ) -> Option<Self> {
        let original_box = selection.selection_box()?;
        let before = selection.snapshot(layer);
        if before.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            layer_id: layer.id,
            start,
            before,
            original_box,
        })
    }

    pub fn before(&self) -> &[Drawable] {
        &self.before
    }

    /// Restore each selected drawable from its snapshot and apply `f`.
    fn reapply(&self, layer: &mut Layer, f: impl Fn(&mut Drawable)) {
        for original in &self.before {
            if let Some(drawable) = layer.get_mut(original.id()) {
                let body = original.body().clone();
                drawable.edit(|b| *b = body);
                f(drawable);
            }
        }
    }

    /// Apply the gesture for the pointer at `pointer`; returns the new box.
    pub fn update(&self, layer: &mut Layer, pointer: Point) -> Rect {
        match self.kind {
            TransformKind::Move => {
                let delta = pointer - self.start;
                self.reapply(layer, |d| d.translate(delta));
                self.original_box + delta
            }
            TransformKind::Resize(handle) => {
                let (sx, sy, anchor) = self.resize_params(handle, pointer);
                self.reapply(layer, |d| d.scale_about(anchor, sx, sy));
                let a = Point::new(
                    anchor.x + (self.original_box.x0 - anchor.x) * sx,
                    anchor.y + (self.original_box.y0 - anchor.y) * sy,
                );
                let b = Point::new(
                    anchor.x + (self.original_box.x1 - anchor.x) * sx,
                    anchor.y + (self.original_box.y1 - anchor.y) * sy,
                );
                Rect::from_points(a, b)
            }
        }
    }

    /// Scale factors and anchor for dragging `handle` to `pointer`.
    fn resize_params(&self, handle: HandleKind, pointer: Point) -> (f64, f64, Point) {
        let anchor = handle.opposite().position(self.original_box);
        let grabbed = handle.position(self.original_box);
        let (sx, sy) = scale_factors(grabbed - anchor, pointer - anchor);
        let (scale_x, scale_y) = handle.axes();
        (
            if scale_x { sx } else { 1.0 },
            if scale_y { sy } else { 1.0 },
            anchor,
        )
    }

    /// End the gesture. Returns a single `Modify` action when the geometry
    /// actually changed.
    pub fn finish(self, layer: &Layer) -> Option<HistoryAction> {
        let after: Vec<Drawable> = self
            .before
            .iter()
            .filter_map(|d| layer.get(d.id()))
            .map(Drawable::snapshot)
            .collect();
        if after == self.before {
            return None;
        }
        Some(HistoryAction::Modify {
            before: self.before,
            after,
            layer_id: self.layer_id,
        })
    }
}
