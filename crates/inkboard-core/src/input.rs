//! Input events and the exclusive gesture state.

use crate::drawable::Drawable;
use crate::selection::TransformGesture;
use crate::tools::ToolKind;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Host-assigned pointer identifier (mouse, pen, or touch contact).
pub type PointerId = u64;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pointer events in screen coordinates (physical pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        id: PointerId,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    Move {
        id: PointerId,
        position: Point,
    },
    Up {
        id: PointerId,
        position: Point,
    },
    /// The platform cancelled the pointer; treated like `Up`.
    Cancel { id: PointerId, position: Point },
    /// The pointer left the surface; treated like `Up`.
    Leave { id: PointerId, position: Point },
}

impl PointerEvent {
    pub fn id(&self) -> PointerId {
        match self {
            PointerEvent::Down { id, .. }
            | PointerEvent::Move { id, .. }
            | PointerEvent::Up { id, .. }
            | PointerEvent::Cancel { id, .. }
            | PointerEvent::Leave { id, .. } => *id,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Cancel { position, .. }
            | PointerEvent::Leave { position, .. } => *position,
        }
    }

}

/// Wheel and trackpad events in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WheelEvent {
    /// Mouse wheel or two-finger scroll.
    Scroll {
        position: Point,
        delta: Vec2,
        modifiers: Modifiers,
    },
    /// Trackpad pinch with a multiplicative zoom factor.
    Zoom { position: Point, factor: f64 },
}

/// Screen positions of the pointers currently in contact.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    active: HashMap<PointerId, Point>,
    order: Vec<PointerId>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, id: PointerId, position: Point) {
        if self.active.insert(id, position).is_none() {
            self.order.push(id);
        }
    }

    /// Update a tracked pointer; returns false for an untracked one.
    pub fn update(&mut self, id: PointerId, position: Point) -> bool {
        match self.active.get_mut(&id) {
            Some(p) => {
                *p = position;
                true
            }
            None => false,
        }
    }

    pub fn release(&mut self, id: PointerId) -> bool {
        self.order.retain(|p| *p != id);
        self.active.remove(&id).is_some()
    }

    pub fn count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, id: PointerId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn position(&self, id: PointerId) -> Option<Point> {
        self.active.get(&id).copied()
    }

    /// The two earliest pressed pointers.
    pub fn first_two(&self) -> Option<((PointerId, Point), (PointerId, Point))> {
        let a = *self.order.first()?;
        let b = *self.order.get(1)?;
        Some(((a, self.position(a)?), (b, self.position(b)?)))
    }
}

/// What a drawing gesture is producing.
#[derive(Debug, Clone)]
pub enum DrawingGesture {
    /// Pen/highlighter: raw canvas points plus the smoothed preview.
    Freehand {
        tool: ToolKind,
        raw: Vec<Point>,
        drawable: Drawable,
    },
    /// Shape tool template anchored at the press point.
    Shape { drawable: Drawable },
    /// Eraser: drawables are marked in place.
    Erasing,
    /// Laser pointer: points go to the laser trail only.
    Laser,
}

/// Two-finger pinch zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchState {
    pub pointers: (PointerId, PointerId),
    pub start_distance: f64,
    pub start_scale: f64,
    /// Canvas point under the midpoint when the pinch began.
    pub anchor: Point,
}

/// The single active gesture.
#[derive(Debug, Clone, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Drawing {
        pointer: PointerId,
        gesture: DrawingGesture,
    },
    Panning {
        pointer: PointerId,
        last: Point,
    },
    Lassoing {
        pointer: PointerId,
        points: Vec<Point>,
    },
    MovingSelection {
        pointer: PointerId,
        gesture: TransformGesture,
    },
    ResizingSelection {
        pointer: PointerId,
        gesture: TransformGesture,
    },
    Pinching(PinchState),
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }

    /// Pointer driving a single-pointer gesture.
    pub fn pointer(&self) -> Option<PointerId> {
        match self {
            GestureState::Idle | GestureState::Pinching(_) => None,
            GestureState::Drawing { pointer, .. }
            | GestureState::Panning { pointer, .. }
            | GestureState::Lassoing { pointer, .. }
            | GestureState::MovingSelection { pointer, .. }
            | GestureState::ResizingSelection { pointer, .. } => Some(*pointer),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            GestureState::Idle => "idle",
            GestureState::Drawing { .. } => "drawing",
            GestureState::Panning { .. } => "panning",
            GestureState::Lassoing { .. } => "lassoing",
            GestureState::MovingSelection { .. } => "moving",
            GestureState::ResizingSelection { .. } => "resizing",
            GestureState::Pinching(_) => "pinching",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_order_and_release() {
        let mut tracker = PointerTracker::new();
        tracker.press(1, Point::new(0.0, 0.0));
        tracker.press(2, Point::new(10.0, 0.0));
        tracker.press(3, Point::new(20.0, 0.0));
        assert_eq!(tracker.count(), 3);

        let ((a, _), (b, pb)) = tracker.first_two().unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(pb, Point::new(10.0, 0.0));

        assert!(tracker.release(1));
        assert!(!tracker.release(1));
        let ((a, _), (b, _)) = tracker.first_two().unwrap();
        assert_eq!((a, b), (2, 3));
    }

    #[test]
    fn test_tracker_ignores_unknown_moves() {
        let mut tracker = PointerTracker::new();
        assert!(!tracker.update(9, Point::ZERO));
        tracker.press(9, Point::ZERO);
        assert!(tracker.update(9, Point::new(1.0, 1.0)));
        assert_eq!(tracker.position(9), Some(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_event_accessors() {
        let leave = PointerEvent::Leave {
            id: 4,
            position: Point::new(3.0, 4.0),
        };
        assert_eq!(leave.id(), 4);
        assert_eq!(leave.position(), Point::new(3.0, 4.0));
    }
}
