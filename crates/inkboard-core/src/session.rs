//! Editing session: the host-facing entry points and the pointer state machine.

use crate::canvas::{Canvas, EditError, LayerId};
use crate::drawable::{Drawable, DrawableBody, SerializableColor, Shape, Stroke};
use crate::frame::Frame;
use crate::history::{History, HistoryAction};
use crate::input::{
    DrawingGesture, GestureState, MouseButton, PinchState, PointerEvent, PointerId,
    PointerTracker, WheelEvent,
};
use crate::overlay::LaserTrail;
use crate::selection::{
    HANDLE_HIT_TOLERANCE, Selection, TransformGesture, TransformKind, lasso_select,
};
use crate::smoothing::smooth_points;
use crate::storage::{Storage, StorageError, StorageResult};
use crate::tools::{ToolConfig, ToolKind};
use crate::view::{ViewState, ViewTransform};
use kurbo::{Point, Size};

// Use web_time for WASM compatibility
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Shapes narrower or shorter than this on screen are discarded on release.
pub const MIN_SHAPE_EXTENT_PX: f64 = 3.0;
/// Screen padding around content for [`Session::fit_to_content`].
pub const FIT_PADDING: f64 = 40.0;

/// Wheel zoom step per notch.
const WHEEL_ZOOM_IN: f64 = 1.1;
const WHEEL_ZOOM_OUT: f64 = 0.9;

/// One open document plus all per-document editing state.
#[derive(Debug)]
pub struct Session {
    document_id: String,
    canvas: Canvas,
    history: History,
    selection: Selection,
    view: ViewState,
    config: ToolConfig,
    gesture: GestureState,
    pointers: PointerTracker,
    laser: LaserTrail,
    viewport: Size,
}

impl Session {
    /// Start editing `canvas`; the view resumes from the persisted pan/scale.
    pub fn open(document_id: impl Into<String>, canvas: Canvas, config: ToolConfig) -> Self {
        let document_id = document_id.into();
        log::info!(
            "Opening document {} ({} drawables on {} layers)",
            document_id,
            canvas.drawable_count(),
            canvas.layers().len()
        );
        Self {
            document_id,
            view: ViewState::at(canvas.view()),
            canvas,
            history: History::new(),
            selection: Selection::new(),
            config,
            gesture: GestureState::Idle,
            pointers: PointerTracker::new(),
            laser: LaserTrail::new(),
            viewport: Size::new(800.0, 600.0),
        }
    }

    /// Load `document_id` from `storage` and open it. A missing document
    /// opens as an empty canvas.
    pub async fn open_from(
        storage: &dyn Storage,
        document_id: &str,
        config: ToolConfig,
    ) -> StorageResult<Self> {
        let canvas = match storage.load(document_id).await {
            Ok(canvas) => canvas,
            Err(StorageError::NotFound(_)) => {
                log::info!("Document {} not found; starting empty", document_id);
                Canvas::new()
            }
            Err(err) => return Err(err),
        };
        Ok(Self::open(document_id, canvas, config))
    }

    /// End the session, committing any active gesture. The returned canvas
    /// carries the final view.
    pub fn close(mut self) -> Canvas {
        self.finish_gesture();
        self.canvas.set_view(self.view.target);
        self.canvas
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn laser(&self) -> &LaserTrail {
        &self.laser
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Replace the tool configuration. An active gesture is committed
    /// first so it finishes with the settings it started with.
    pub fn set_tool_config(&mut self, config: ToolConfig) {
        self.finish_gesture();
        self.config = config;
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Input -------------------------------------------------------------

    /// Feed a pointer event stamped with the current time.
    pub fn pointer_event(&mut self, event: PointerEvent) {
        self.pointer_event_at(event, Instant::now());
    }

    /// Feed a pointer event captured at `now`.
    pub fn pointer_event_at(&mut self, event: PointerEvent, now: Instant) {
        match event {
            PointerEvent::Down {
                id,
                position,
                button,
                modifiers,
            } => {
                if self.pointers.is_active(id) {
                    return;
                }
                self.pointers.press(id, position);
                if self.pointers.count() >= 2 {
                    if !matches!(self.gesture, GestureState::Pinching(_)) {
                        self.begin_pinch();
                    }
                    return;
                }
                if !self.gesture.is_idle() {
                    return;
                }

                let tool = self.config.active_tool;
                if button != MouseButton::Left || tool == ToolKind::Pan || modifiers.alt {
                    self.gesture = GestureState::Panning {
                        pointer: id,
                        last: position,
                    };
                    return;
                }
                self.pointer_down(id, position, tool, now);
            }
            PointerEvent::Move { id, position } => {
                if self.pointers.update(id, position) {
                    self.pointer_move(id, position, now);
                }
            }
            // Up, Cancel and Leave all end the contact.
            release => {
                let id = release.id();
                if self.pointers.release(id) {
                    log::trace!("Pointer {id} released at {:?}", release.position());
                    self.pointer_up(id);
                }
            }
        }
    }

    /// Primary-button press with no pan override.
    fn pointer_down(&mut self, id: PointerId, position: Point, tool: ToolKind, now: Instant) {
        let point = self.view.screen_to_canvas(position);

        let tolerance = HANDLE_HIT_TOLERANCE / self.view.current.scale;
        if let Some(handle) = self.selection.hit_handle(point, tolerance) {
            let layer = self.canvas.active_layer();
            if let Some(gesture) = TransformGesture::begin(
                TransformKind::Resize(handle),
                layer,
                &self.selection,
                point,
            ) {
                self.gesture = GestureState::ResizingSelection {
                    pointer: id,
                    gesture,
                };
                return;
            }
        }
        if self.selection.box_contains(point) {
            let layer = self.canvas.active_layer();
            if let Some(gesture) =
                TransformGesture::begin(TransformKind::Move, layer, &self.selection, point)
            {
                self.gesture = GestureState::MovingSelection {
                    pointer: id,
                    gesture,
                };
                return;
            }
        }

        self.selection.clear();
        let brush = self.config.brush(tool);
        self.gesture = match tool {
            ToolKind::Pen | ToolKind::Highlighter => {
                let mut stroke = Stroke::new(vec![point], brush.color, brush.line_width);
                stroke.opacity = brush.clamped_opacity();
                stroke.smoothness = brush.smoothness.clamp(0.0, 100.0);
                GestureState::Drawing {
                    pointer: id,
                    gesture: DrawingGesture::Freehand {
                        tool,
                        raw: vec![point],
                        drawable: Drawable::stroke(stroke),
                    },
                }
            }
            ToolKind::Rectangle | ToolKind::Circle | ToolKind::Triangle => {
                let Some(kind) = tool.shape_kind() else {
                    return;
                };
                let mut shape = Shape::new(kind, point, brush.color, brush.line_width);
                shape.opacity = brush.clamped_opacity();
                GestureState::Drawing {
                    pointer: id,
                    gesture: DrawingGesture::Shape {
                        drawable: Drawable::shape(shape),
                    },
                }
            }
            ToolKind::Eraser => {
                let radius = self.eraser_radius();
                mark_erased(&mut self.canvas, point, radius);
                GestureState::Drawing {
                    pointer: id,
                    gesture: DrawingGesture::Erasing,
                }
            }
            ToolKind::Lasso => GestureState::Lassoing {
                pointer: id,
                points: vec![point],
            },
            ToolKind::Laser => {
                self.laser.push(point, now);
                GestureState::Drawing {
                    pointer: id,
                    gesture: DrawingGesture::Laser,
                }
            }
            ToolKind::Pan => GestureState::Panning {
                pointer: id,
                last: position,
            },
        };
        log::debug!("Gesture started: {}", self.gesture.name());
    }

    fn pointer_move(&mut self, id: PointerId, position: Point, now: Instant) {
        if let GestureState::Pinching(pinch) = self.gesture {
            self.update_pinch(&pinch);
            return;
        }
        if self.gesture.pointer() != Some(id) {
            return;
        }

        let point = self.view.screen_to_canvas(position);
        let eraser_radius = self.eraser_radius();
        match &mut self.gesture {
            GestureState::Drawing { gesture, .. } => match gesture {
                DrawingGesture::Freehand { raw, drawable, .. } => {
                    raw.push(point);
                    drawable.edit(|body| {
                        if let DrawableBody::Stroke(stroke) = body {
                            stroke.points = smooth_points(raw, stroke.smoothness);
                        }
                    });
                }
                DrawingGesture::Shape { drawable } => {
                    drawable.edit(|body| {
                        if let DrawableBody::Shape(shape) = body {
                            shape.drag_to(point);
                        }
                    });
                }
                DrawingGesture::Erasing => mark_erased(&mut self.canvas, point, eraser_radius),
                DrawingGesture::Laser => self.laser.push(point, now),
            },
            GestureState::Panning { last, .. } => {
                let delta = position - *last;
                *last = position;
                self.view.pan_by(delta);
            }
            GestureState::Lassoing { points, .. } => points.push(point),
            GestureState::MovingSelection { gesture, .. }
            | GestureState::ResizingSelection { gesture, .. } => {
                if let Some(layer) = self.canvas.layer_mut(gesture.layer_id) {
                    gesture.update(layer, point);
                    self.selection.refresh(layer);
                }
            }
            GestureState::Idle | GestureState::Pinching(_) => {}
        }
    }

    fn pointer_up(&mut self, id: PointerId) {
        match self.gesture {
            GestureState::Pinching(pinch) => {
                if pinch.pointers.0 == id || pinch.pointers.1 == id {
                    log::debug!("Pinch ended");
                    self.gesture = GestureState::Idle;
                }
            }
            _ if self.gesture.pointer() == Some(id) => self.finish_gesture(),
            _ => {}
        }
    }

    /// A second pointer landed: end the single-pointer gesture and zoom.
    fn begin_pinch(&mut self) {
        match &self.gesture {
            GestureState::Drawing { .. } | GestureState::Lassoing { .. } => self.cancel_gesture(),
            _ => self.finish_gesture(),
        }

        let Some(((a, pa), (b, pb))) = self.pointers.first_two() else {
            return;
        };
        let start_distance = pa.distance(pb);
        if start_distance <= f64::EPSILON {
            return;
        }
        let midpoint = pa.midpoint(pb);
        self.gesture = GestureState::Pinching(PinchState {
            pointers: (a, b),
            start_distance,
            start_scale: self.view.target.scale,
            anchor: self.view.target.screen_to_canvas(midpoint),
        });
        log::debug!("Pinch started between pointers {} and {}", a, b);
    }

    fn update_pinch(&mut self, pinch: &PinchState) {
        let (a, b) = pinch.pointers;
        let (Some(pa), Some(pb)) = (self.pointers.position(a), self.pointers.position(b)) else {
            return;
        };
        let scale = pinch.start_scale * pa.distance(pb) / pinch.start_distance;
        self.view.pin(pinch.anchor, pa.midpoint(pb), scale);
    }

    /// Feed a wheel or trackpad event.
    pub fn wheel(&mut self, event: WheelEvent) {
        match event {
            WheelEvent::Scroll {
                position,
                delta,
                modifiers,
            } => {
                if modifiers.ctrl || modifiers.meta || delta.x == 0.0 {
                    let factor = if delta.y > 0.0 {
                        WHEEL_ZOOM_IN
                    } else if delta.y < 0.0 {
                        WHEEL_ZOOM_OUT
                    } else {
                        return;
                    };
                    self.view.zoom_at(position, factor);
                } else {
                    self.view.pan_by(delta);
                }
            }
            WheelEvent::Zoom { position, factor } => {
                if factor.is_finite() && factor > 0.0 {
                    self.view.zoom_at(position, factor);
                }
            }
        }
    }

    fn eraser_radius(&self) -> f64 {
        self.config.eraser_radius / self.view.current.scale
    }

    // --- Gesture completion -------------------------------------------------

    /// Commit the active gesture and return to `Idle`.
    fn finish_gesture(&mut self) {
        let gesture = std::mem::take(&mut self.gesture);
        if !gesture.is_idle() {
            log::debug!("Gesture finished: {}", gesture.name());
        }
        match gesture {
            GestureState::Drawing { gesture, .. } => match gesture {
                DrawingGesture::Freehand { raw, drawable, .. } => {
                    self.commit_freehand(raw, drawable)
                }
                DrawingGesture::Shape { drawable } => self.commit_shape(drawable),
                DrawingGesture::Erasing => self.commit_erase(),
                DrawingGesture::Laser => {}
            },
            GestureState::Lassoing { points, .. } => {
                let layer = self.canvas.active_layer();
                let ids = lasso_select(layer, &points);
                self.selection.set(ids, layer);
            }
            GestureState::MovingSelection { gesture, .. }
            | GestureState::ResizingSelection { gesture, .. } => {
                if let Some(layer) = self.canvas.layer(gesture.layer_id) {
                    if let Some(action) = gesture.finish(layer) {
                        self.history.append(action);
                    }
                    self.selection.refresh(layer);
                }
            }
            GestureState::Idle | GestureState::Panning { .. } | GestureState::Pinching(_) => {}
        }
    }

    fn commit_freehand(&mut self, raw: Vec<Point>, mut drawable: Drawable) {
        if raw.len() < 2 {
            log::debug!("Discarding single-point stroke");
            return;
        }
        drawable.edit(|body| {
            if let DrawableBody::Stroke(stroke) = body {
                stroke.points = smooth_points(&raw, stroke.smoothness);
            }
        });
        if drawable.is_degenerate() {
            log::debug!("Discarding zero-length stroke");
            return;
        }
        self.commit_drawable(drawable);
    }

    fn commit_shape(&mut self, mut drawable: Drawable) {
        let scale = self.view.current.scale;
        let undersized = match drawable.body() {
            DrawableBody::Shape(shape) => {
                shape.width.abs() * scale < MIN_SHAPE_EXTENT_PX
                    || shape.height.abs() * scale < MIN_SHAPE_EXTENT_PX
            }
            DrawableBody::Stroke(_) => false,
        };
        if undersized {
            log::debug!("Discarding undersized shape");
            return;
        }
        drawable.edit(|body| {
            if let DrawableBody::Shape(shape) = body {
                shape.normalize();
            }
        });
        self.commit_drawable(drawable);
    }

    fn commit_drawable(&mut self, mut drawable: Drawable) {
        let layer_id = self.canvas.active_layer_id();
        // The preview mesh is transient; the committed copy builds its own.
        self.canvas.retire_mesh(&mut drawable);
        let action = HistoryAction::add(layer_id, std::slice::from_ref(&drawable));
        match self.canvas.active_layer_mut().push(drawable) {
            Ok(()) => self.history.append(action),
            Err(duplicate) => log::warn!("Drawable {} already committed", duplicate.id()),
        }
    }

    fn commit_erase(&mut self) {
        let layer_id = self.canvas.active_layer_id();
        let ids: Vec<_> = self
            .canvas
            .active_layer()
            .drawables()
            .iter()
            .filter(|d| d.is_erasing())
            .map(Drawable::id)
            .collect();
        if ids.is_empty() {
            return;
        }
        let removed = self.canvas.remove_drawables(layer_id, &ids);
        log::debug!("Erased {} drawables", removed.len());
        self.history.append(HistoryAction::remove(layer_id, &removed));
    }

    /// Abandon the active gesture: drawings and lassos are discarded, eraser
    /// marks cleared, and a move/resize is reverted.
    pub fn cancel_gesture(&mut self) {
        let gesture = std::mem::take(&mut self.gesture);
        match gesture {
            GestureState::Drawing {
                gesture: DrawingGesture::Erasing,
                ..
            } => {
                for drawable in self.canvas.active_layer_mut().drawables_mut() {
                    drawable.set_erasing(false);
                }
            }
            GestureState::MovingSelection { gesture, .. }
            | GestureState::ResizingSelection { gesture, .. } => {
                let restored = gesture.before().iter().map(Drawable::snapshot).collect();
                self.canvas.replace_drawables(gesture.layer_id, restored);
                if let Some(layer) = self.canvas.layer(gesture.layer_id) {
                    self.selection.refresh(layer);
                }
            }
            _ => {}
        }
    }

    // --- Rendering ----------------------------------------------------------

    /// Advance time-based state. Returns true while another tick is needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.laser.prune(now);
        let view_moving = self.view.tick();
        view_moving || !self.laser.is_empty()
    }

    /// Render input for this tick. Hands over retired mesh handles.
    pub fn frame(&mut self) -> Frame<'_> {
        let (layers, retired) = self.canvas.render_parts();
        let no_points: &[Point] = &[];
        let (in_progress, lasso) = match &self.gesture {
            GestureState::Drawing {
                gesture:
                    DrawingGesture::Freehand { drawable, .. } | DrawingGesture::Shape { drawable },
                ..
            } => (Some(drawable), no_points),
            GestureState::Lassoing { points, .. } => (None, points.as_slice()),
            _ => (None, no_points),
        };
        Frame {
            view: self.view.current,
            viewport: self.viewport,
            layers,
            retired,
            in_progress,
            lasso,
            selection_box: self.selection.selection_box(),
            laser: &self.laser,
        }
    }

    // --- Editing commands ---------------------------------------------------

    /// Undo the last action. Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.finish_gesture();
        let undone = self.history.undo(&mut self.canvas);
        if undone {
            self.selection.clear();
        }
        undone
    }

    /// Redo the next action. Returns false when there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.finish_gesture();
        let redone = self.history.redo(&mut self.canvas);
        if redone {
            self.selection.clear();
        }
        redone
    }

    /// Remove the selected drawables as one undoable action.
    pub fn delete_selection(&mut self) -> bool {
        self.finish_gesture();
        if self.selection.is_empty() {
            return false;
        }
        let layer_id = self.canvas.active_layer_id();
        let ids = self.selection.ids().to_vec();
        self.selection.clear();
        let removed = self.canvas.remove_drawables(layer_id, &ids);
        if removed.is_empty() {
            return false;
        }
        self.history.append(HistoryAction::remove(layer_id, &removed));
        true
    }

    /// Recolor the selected drawables as one undoable action.
    pub fn recolor_selection(&mut self, color: SerializableColor) -> bool {
        self.finish_gesture();
        let layer_id = self.canvas.active_layer_id();
        let layer = self.canvas.active_layer_mut();
        let before = self.selection.snapshot(layer);
        if before.is_empty() {
            return false;
        }
        for drawable in layer.drawables_mut() {
            if self.selection.contains(drawable.id()) {
                drawable.set_color(color);
            }
        }
        let after = self.selection.snapshot(layer);
        if before == after {
            return false;
        }
        self.history
            .append(HistoryAction::modify(layer_id, &before, &after));
        true
    }

    /// Add a layer on top and make it active.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        self.finish_gesture();
        self.selection.clear();
        self.canvas.add_layer(name)
    }

    /// Remove a layer. History entries that target it become no-ops.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<(), EditError> {
        self.finish_gesture();
        self.canvas.remove_layer(id)?;
        self.selection.clear();
        Ok(())
    }

    pub fn toggle_layer_visibility(&mut self, id: LayerId) -> Result<bool, EditError> {
        self.finish_gesture();
        let visible = self.canvas.toggle_layer_visibility(id)?;
        if !visible && id == self.canvas.active_layer_id() {
            self.selection.clear();
        }
        Ok(visible)
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> Result<(), EditError> {
        self.finish_gesture();
        self.canvas.set_active_layer(id)?;
        self.selection.clear();
        Ok(())
    }

    /// Ease the view so every visible drawable fits the viewport. An empty
    /// canvas returns to the origin at scale 1.
    pub fn fit_to_content(&mut self) {
        match self.canvas.content_bounds() {
            Some(bounds) => self.view.fit_to_bounds(bounds, self.viewport, FIT_PADDING),
            None => self.view.target = ViewTransform::default(),
        }
    }

    /// Persist the canvas with the current view target. Session state is
    /// untouched when the backend fails.
    pub async fn save(&self, storage: &dyn Storage) -> StorageResult<()> {
        let mut record = self.canvas.clone();
        record.set_view(self.view.target);
        storage.save(&self.document_id, &record).await.inspect_err(|err| {
            log::error!("Failed to save document {}: {}", self.document_id, err);
        })
    }
}

/// Mark drawables on the active layer within `radius` of `point`.
fn mark_erased(canvas: &mut Canvas, point: Point, radius: f64) {
    let layer = canvas.active_layer_mut();
    if !layer.is_visible {
        return;
    }
    for drawable in layer.drawables_mut() {
        if !drawable.is_erasing() && drawable.touched_by_eraser(point, radius) {
            drawable.set_erasing(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BufferManager, MemoryDevice};
    use crate::input::Modifiers;
    use crate::selection::{Corner, HandleKind};
    use crate::storage::{MemoryStorage, block_on};
    use kurbo::Vec2;
    use std::time::Duration;

    fn session(tool: ToolKind) -> Session {
        let _ = env_logger::builder().is_test(true).try_init();
        Session::open("doc", Canvas::new(), ToolConfig::default().with_tool(tool))
    }

    fn set_tool(session: &mut Session, tool: ToolKind) {
        let config = session.config().clone().with_tool(tool);
        session.set_tool_config(config);
    }

    fn down(session: &mut Session, id: PointerId, x: f64, y: f64) {
        down_with(session, id, x, y, MouseButton::Left, Modifiers::default());
    }

    fn down_with(
        session: &mut Session,
        id: PointerId,
        x: f64,
        y: f64,
        button: MouseButton,
        modifiers: Modifiers,
    ) {
        session.pointer_event(PointerEvent::Down {
            id,
            position: Point::new(x, y),
            button,
            modifiers,
        });
    }

    fn move_to(session: &mut Session, id: PointerId, x: f64, y: f64) {
        session.pointer_event(PointerEvent::Move {
            id,
            position: Point::new(x, y),
        });
    }

    fn up(session: &mut Session, id: PointerId, x: f64, y: f64) {
        session.pointer_event(PointerEvent::Up {
            id,
            position: Point::new(x, y),
        });
    }

    fn draw_stroke(session: &mut Session, points: &[(f64, f64)]) {
        let (x, y) = points[0];
        down(session, 1, x, y);
        for &(x, y) in &points[1..] {
            move_to(session, 1, x, y);
        }
        let (x, y) = points[points.len() - 1];
        up(session, 1, x, y);
    }

    fn active_drawables(session: &Session) -> &[Drawable] {
        session.canvas().active_layer().drawables()
    }

    fn select_all(session: &mut Session) {
        set_tool(session, ToolKind::Lasso);
        draw_stroke(
            session,
            &[(-500.0, -500.0), (500.0, -500.0), (500.0, 500.0), (-500.0, 500.0)],
        );
    }

    #[test]
    fn test_pen_stroke_records_one_add() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (20.0, 20.0), (30.0, 10.0), (40.0, 20.0)]);

        assert!(session.gesture().is_idle());
        assert_eq!(active_drawables(&session).len(), 1);
        assert_eq!(session.history().len(), 1);
        assert!(session.can_undo());

        match active_drawables(&session)[0].body() {
            DrawableBody::Stroke(stroke) => {
                assert_eq!(stroke.points.len(), 4);
                assert_eq!(stroke.points[0], Point::new(10.0, 10.0));
                assert_eq!(stroke.points[3], Point::new(40.0, 20.0));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_single_tap_stroke_is_discarded() {
        let mut session = session(ToolKind::Pen);
        down(&mut session, 1, 5.0, 5.0);
        up(&mut session, 1, 5.0, 5.0);
        assert!(active_drawables(&session).is_empty());
        assert!(!session.can_undo());
    }

    #[test]
    fn test_zero_length_stroke_is_discarded() {
        let mut session = session(ToolKind::Pen);
        down(&mut session, 1, 5.0, 5.0);
        move_to(&mut session, 1, 5.0, 5.0);
        up(&mut session, 1, 5.0, 5.0);
        assert!(session.gesture().is_idle());
        assert!(active_drawables(&session).is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_repeated_press_is_ignored() {
        let mut session = session(ToolKind::Pen);
        down(&mut session, 1, 5.0, 5.0);
        down(&mut session, 1, 40.0, 40.0);
        assert!(matches!(session.gesture(), GestureState::Drawing { .. }));

        move_to(&mut session, 1, 20.0, 5.0);
        up(&mut session, 1, 20.0, 5.0);
        assert_eq!(active_drawables(&session).len(), 1);
        match active_drawables(&session)[0].body() {
            DrawableBody::Stroke(stroke) => assert_eq!(stroke.points[0], Point::new(5.0, 5.0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_undersized_shape_is_discarded() {
        let mut session = session(ToolKind::Rectangle);
        draw_stroke(&mut session, &[(0.0, 0.0), (2.0, 40.0)]);
        assert!(active_drawables(&session).is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_shape_dragged_up_left_is_normalized() {
        let mut session = session(ToolKind::Rectangle);
        draw_stroke(&mut session, &[(50.0, 50.0), (30.0, 30.0), (10.0, 20.0)]);

        match active_drawables(&session)[0].body() {
            DrawableBody::Shape(shape) => {
                assert_eq!((shape.x, shape.y), (10.0, 20.0));
                assert_eq!((shape.width, shape.height), (40.0, 30.0));
            }
            _ => unreachable!(),
        }
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_eraser_removes_marked_as_one_action() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(0.0, 0.0), (50.0, 0.0)]);
        draw_stroke(&mut session, &[(0.0, 100.0), (50.0, 100.0)]);
        draw_stroke(&mut session, &[(0.0, 300.0), (50.0, 300.0)]);

        set_tool(&mut session, ToolKind::Eraser);
        down(&mut session, 1, 0.0, 2.0);
        move_to(&mut session, 1, 50.0, 98.0);
        let marked = active_drawables(&session)
            .iter()
            .filter(|d| d.is_erasing())
            .count();
        assert_eq!(marked, 2);
        up(&mut session, 1, 50.0, 98.0);

        assert_eq!(active_drawables(&session).len(), 1);
        assert!(!active_drawables(&session)[0].is_erasing());
        assert_eq!(session.history().len(), 4);

        assert!(session.undo());
        assert_eq!(active_drawables(&session).len(), 3);
        assert!(active_drawables(&session).iter().all(|d| !d.is_erasing()));
    }

    #[test]
    fn test_undo_erase_restores_stacking_order() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(0.0, 0.0), (50.0, 0.0)]);
        draw_stroke(&mut session, &[(0.0, 100.0), (50.0, 100.0)]);
        draw_stroke(&mut session, &[(0.0, 200.0), (50.0, 200.0)]);
        let order: Vec<_> = active_drawables(&session).iter().map(Drawable::id).collect();

        set_tool(&mut session, ToolKind::Eraser);
        down(&mut session, 1, 25.0, 0.0);
        up(&mut session, 1, 25.0, 0.0);
        assert_eq!(active_drawables(&session).len(), 2);

        assert!(session.undo());
        let restored: Vec<_> = active_drawables(&session).iter().map(Drawable::id).collect();
        assert_eq!(restored, order);
    }

    #[test]
    fn test_cancelled_erase_clears_marks() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(0.0, 0.0), (50.0, 0.0)]);
        set_tool(&mut session, ToolKind::Eraser);
        down(&mut session, 1, 0.0, 0.0);
        assert!(active_drawables(&session)[0].is_erasing());

        session.cancel_gesture();
        assert!(!active_drawables(&session)[0].is_erasing());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_lasso_selects_enclosed_stroke() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 30.0)]);
        draw_stroke(&mut session, &[(300.0, 300.0), (330.0, 330.0)]);

        set_tool(&mut session, ToolKind::Lasso);
        draw_stroke(&mut session, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);

        assert_eq!(session.selection().len(), 1);
        assert_eq!(session.selection().ids()[0], active_drawables(&session)[0].id());
        // Selection changes are not history actions.
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_move_selection_records_single_modify() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 10.0), (50.0, 60.0)]);
        select_all(&mut session);
        let start = session.selection().selection_box().unwrap().center();

        down(&mut session, 1, start.x, start.y);
        assert!(matches!(session.gesture(), GestureState::MovingSelection { .. }));
        move_to(&mut session, 1, start.x + 2.0, start.y + 2.0);
        move_to(&mut session, 1, start.x + 5.0, start.y + 7.0);
        up(&mut session, 1, start.x + 5.0, start.y + 7.0);

        assert_eq!(session.history().len(), 2);
        match active_drawables(&session)[0].body() {
            DrawableBody::Stroke(stroke) => assert_eq!(stroke.points[0], Point::new(15.0, 17.0)),
            _ => unreachable!(),
        }
        assert_eq!(session.selection().len(), 1);

        assert!(session.undo());
        match active_drawables(&session)[0].body() {
            DrawableBody::Stroke(stroke) => assert_eq!(stroke.points[0], Point::new(10.0, 10.0)),
            _ => unreachable!(),
        }
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_resize_from_corner_handle() {
        let mut session = session(ToolKind::Rectangle);
        draw_stroke(&mut session, &[(0.0, 0.0), (100.0, 100.0)]);
        select_all(&mut session);
        let bounds = session.selection().selection_box().unwrap();
        let handle = HandleKind::Corner(Corner::BottomRight).position(bounds);

        down(&mut session, 1, handle.x + 3.0, handle.y + 3.0);
        assert!(matches!(
            session.gesture(),
            GestureState::ResizingSelection { .. }
        ));
        // Double the width; the height stays put.
        move_to(&mut session, 1, handle.x + bounds.width(), handle.y);
        up(&mut session, 1, handle.x + bounds.width(), handle.y);

        assert_eq!(session.history().len(), 2);
        let new_box = session.selection().selection_box().unwrap();
        assert!(new_box.width() > bounds.width() * 1.5);
        assert!((new_box.height() - bounds.height()).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_move_restores_geometry() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (50.0, 30.0)]);
        select_all(&mut session);
        let before = active_drawables(&session)[0].snapshot();
        let start = session.selection().selection_box().unwrap().center();

        down(&mut session, 1, start.x, start.y);
        move_to(&mut session, 1, start.x + 40.0, start.y);
        session.cancel_gesture();

        assert_eq!(active_drawables(&session)[0], before);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_second_pointer_pinches_and_cancels_drawing() {
        let mut session = session(ToolKind::Pen);
        down(&mut session, 1, 100.0, 100.0);
        down(&mut session, 2, 200.0, 100.0);
        assert!(matches!(session.gesture(), GestureState::Pinching(_)));

        // Pinch began at distance 100 around (150, 100); doubling the
        // distance doubles the scale.
        move_to(&mut session, 2, 300.0, 100.0);
        let target = session.view().target;
        assert!((target.scale - 2.0).abs() < 1e-9);
        assert!((target.pan - Vec2::new(-100.0, -100.0)).hypot() < 1e-9);

        up(&mut session, 2, 300.0, 100.0);
        assert!(session.gesture().is_idle());
        up(&mut session, 1, 100.0, 100.0);
        assert!(active_drawables(&session).is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_right_button_pans_without_lag() {
        let mut session = session(ToolKind::Pen);
        down_with(&mut session, 1, 0.0, 0.0, MouseButton::Right, Modifiers::default());
        move_to(&mut session, 1, 10.0, 5.0);
        up(&mut session, 1, 10.0, 5.0);

        assert_eq!(session.view().current.pan, Vec2::new(10.0, 5.0));
        assert_eq!(session.view().target.pan, Vec2::new(10.0, 5.0));
        assert!(active_drawables(&session).is_empty());
    }

    #[test]
    fn test_alt_click_pans() {
        let mut session = session(ToolKind::Rectangle);
        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };
        down_with(&mut session, 1, 0.0, 0.0, MouseButton::Left, alt);
        assert!(matches!(session.gesture(), GestureState::Panning { .. }));
    }

    #[test]
    fn test_wheel_zoom_and_pan() {
        let mut zoomed = session(ToolKind::Pen);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        zoomed.wheel(WheelEvent::Scroll {
            position: Point::new(100.0, 100.0),
            delta: Vec2::new(3.0, 1.0),
            modifiers: ctrl,
        });
        let target = zoomed.view().target;
        assert!((target.scale - 1.1).abs() < 1e-9);
        // The point under the cursor stays put.
        let anchored = target.canvas_to_screen(Point::new(100.0, 100.0));
        assert!((anchored - Point::new(100.0, 100.0)).hypot() < 1e-9);

        let mut panned = session(ToolKind::Pen);
        panned.wheel(WheelEvent::Scroll {
            position: Point::ZERO,
            delta: Vec2::new(5.0, 3.0),
            modifiers: Modifiers::default(),
        });
        assert_eq!(panned.view().current.pan, Vec2::new(5.0, 3.0));
        assert!((panned.view().target.scale - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tick_eases_toward_zoom_target() {
        let mut session = session(ToolKind::Pen);
        session.wheel(WheelEvent::Zoom {
            position: Point::ZERO,
            factor: 2.0,
        });
        let now = Instant::now();
        assert!(session.tick(now));
        let scale = session.view().current.scale;
        assert!(scale > 1.0 && scale < 2.0);

        for _ in 0..200 {
            session.tick(now);
        }
        assert!(!session.tick(now));
        assert!((session.view().current.scale - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_laser_trail_fades_and_is_not_persisted() {
        let mut session = session(ToolKind::Laser);
        let start = Instant::now();
        session.pointer_event_at(
            PointerEvent::Down {
                id: 1,
                position: Point::new(0.0, 0.0),
                button: MouseButton::Left,
                modifiers: Modifiers::default(),
            },
            start,
        );
        session.pointer_event_at(
            PointerEvent::Move {
                id: 1,
                position: Point::new(10.0, 0.0),
            },
            start + Duration::from_millis(100),
        );
        session.pointer_event_at(
            PointerEvent::Up {
                id: 1,
                position: Point::new(10.0, 0.0),
            },
            start + Duration::from_millis(100),
        );
        assert_eq!(session.laser().len(), 2);
        assert!(active_drawables(&session).is_empty());
        assert!(session.history().is_empty());

        assert!(session.tick(start + Duration::from_millis(550)));
        assert_eq!(session.laser().len(), 1);
        assert!(!session.tick(start + Duration::from_millis(700)));
        assert!(session.laser().is_empty());
    }

    #[test]
    fn test_frame_carries_in_progress_and_lasso() {
        let mut session = session(ToolKind::Pen);
        let mut buffers = BufferManager::new(MemoryDevice::new());

        down(&mut session, 1, 0.0, 0.0);
        move_to(&mut session, 1, 20.0, 0.0);
        {
            let mut frame = session.frame();
            assert!(frame.in_progress.is_some());
            let draw_list = buffers.prepare_frame(&mut frame);
            assert!(draw_list.has_transient);
            assert!(draw_list.meshes.is_empty());
        }
        up(&mut session, 1, 20.0, 0.0);

        {
            let mut frame = session.frame();
            assert!(frame.in_progress.is_none());
            let draw_list = buffers.prepare_frame(&mut frame);
            assert!(!draw_list.has_transient);
            assert_eq!(draw_list.meshes.len(), 1);
        }

        set_tool(&mut session, ToolKind::Lasso);
        down(&mut session, 1, 0.0, 0.0);
        move_to(&mut session, 1, 10.0, 10.0);
        assert_eq!(session.frame().lasso.len(), 2);
    }

    #[test]
    fn test_delete_selection_and_undo() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 30.0)]);
        select_all(&mut session);

        assert!(session.delete_selection());
        assert!(active_drawables(&session).is_empty());
        assert!(session.selection().is_empty());
        assert!(!session.delete_selection());

        assert!(session.undo());
        assert_eq!(active_drawables(&session).len(), 1);
        assert!(session.redo());
        assert!(active_drawables(&session).is_empty());
    }

    #[test]
    fn test_recolor_selection_is_undoable() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 30.0)]);
        select_all(&mut session);
        let red = SerializableColor::new(255, 0, 0, 255);

        assert!(session.recolor_selection(red));
        assert_eq!(active_drawables(&session)[0].color(), red);
        assert!(!session.recolor_selection(red));

        assert!(session.undo());
        assert_eq!(active_drawables(&session)[0].color(), SerializableColor::black());
    }

    #[test]
    fn test_undo_after_layer_removed_moves_cursor() {
        let mut session = session(ToolKind::Pen);
        let first = session.canvas().active_layer_id();
        let second = session.add_layer("Layer 2");
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 30.0)]);
        assert_eq!(session.canvas().layer(second).unwrap().len(), 1);

        session.remove_layer(second).unwrap();
        assert_eq!(session.canvas().active_layer_id(), first);
        assert!(session.undo());
        assert!(!session.can_undo());
        assert_eq!(session.canvas().drawable_count(), 0);
    }

    #[test]
    fn test_layer_errors_propagate() {
        let mut session = session(ToolKind::Pen);
        let only = session.canvas().active_layer_id();
        assert_eq!(session.remove_layer(only), Err(EditError::LastLayer));
        let unknown = uuid::Uuid::new_v4();
        assert_eq!(
            session.set_active_layer(unknown),
            Err(EditError::UnknownLayer(unknown))
        );
        assert_eq!(session.toggle_layer_visibility(only), Ok(false));
    }

    #[test]
    fn test_eraser_ignores_hidden_layer() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(0.0, 0.0), (50.0, 0.0)]);
        let layer = session.canvas().active_layer_id();
        session.toggle_layer_visibility(layer).unwrap();

        set_tool(&mut session, ToolKind::Eraser);
        draw_stroke(&mut session, &[(0.0, 0.0), (50.0, 0.0)]);
        assert_eq!(active_drawables(&session).len(), 1);
    }

    #[test]
    fn test_fit_to_content_centers_bounds() {
        let mut session = session(ToolKind::Rectangle);
        session.set_viewport(Size::new(880.0, 680.0));
        draw_stroke(&mut session, &[(0.0, 0.0), (400.0, 300.0)]);
        session.fit_to_content();

        let target = session.view().target;
        let bounds = session.canvas().content_bounds().unwrap();
        let center = target.canvas_to_screen(bounds.center());
        assert!((center - Point::new(440.0, 340.0)).hypot() < 1e-9);
        assert!(target.scale > 1.0);
    }

    #[test]
    fn test_save_and_reopen_restores_view() {
        let storage = MemoryStorage::new();
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 30.0)]);
        session.wheel(WheelEvent::Zoom {
            position: Point::ZERO,
            factor: 2.0,
        });
        block_on(session.save(&storage)).unwrap();

        let reopened =
            block_on(Session::open_from(&storage, "doc", ToolConfig::default())).unwrap();
        assert_eq!(reopened.canvas().drawable_count(), 1);
        assert!((reopened.view().current.scale - 2.0).abs() < 1e-9);
        assert!(!reopened.can_undo());

        let fresh =
            block_on(Session::open_from(&storage, "missing", ToolConfig::default())).unwrap();
        assert_eq!(fresh.canvas().drawable_count(), 0);
    }

    #[test]
    fn test_close_commits_active_gesture() {
        let mut session = session(ToolKind::Pen);
        down(&mut session, 1, 0.0, 0.0);
        move_to(&mut session, 1, 20.0, 20.0);
        let canvas = session.close();
        assert_eq!(canvas.drawable_count(), 1);
    }

    #[test]
    fn test_pointer_leave_commits_like_up() {
        let mut session = session(ToolKind::Pen);
        down(&mut session, 1, 0.0, 0.0);
        move_to(&mut session, 1, 20.0, 20.0);
        session.pointer_event(PointerEvent::Leave {
            id: 1,
            position: Point::new(20.0, 20.0),
        });
        assert_eq!(active_drawables(&session).len(), 1);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_unselected_press_clears_selection() {
        let mut session = session(ToolKind::Pen);
        draw_stroke(&mut session, &[(10.0, 10.0), (30.0, 30.0)]);
        select_all(&mut session);
        assert_eq!(session.selection().len(), 1);
        assert_eq!(
            session.selection().selection_box(),
            Some(active_drawables(&session)[0].bounds())
        );

        set_tool(&mut session, ToolKind::Pen);
        draw_stroke(&mut session, &[(300.0, 300.0), (320.0, 320.0)]);
        assert!(session.selection().is_empty());
    }
}
