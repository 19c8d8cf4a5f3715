//! Bounded undo/redo log over structural edits.

use crate::canvas::{Canvas, LayerId};
use crate::drawable::{Drawable, DrawableId};

/// Maximum number of actions kept in the log.
pub const HISTORY_CAPACITY: usize = 100;

/// One undoable structural edit. Every drawable stored here is an
/// independent deep copy.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryAction {
    Add {
        drawables: Vec<Drawable>,
        layer_id: LayerId,
    },
    /// Removed drawables with their indices in the layer before removal.
    Remove {
        drawables: Vec<(usize, Drawable)>,
        layer_id: LayerId,
    },
    Modify {
        before: Vec<Drawable>,
        after: Vec<Drawable>,
        layer_id: LayerId,
    },
}

fn snapshots(drawables: &[Drawable]) -> Vec<Drawable> {
    drawables.iter().map(Drawable::snapshot).collect()
}

fn ids(drawables: &[Drawable]) -> Vec<DrawableId> {
    drawables.iter().map(Drawable::id).collect()
}

impl HistoryAction {
    pub fn add(layer_id: LayerId, drawables: &[Drawable]) -> Self {
        HistoryAction::Add {
            drawables: snapshots(drawables),
            layer_id,
        }
    }

    pub fn remove(layer_id: LayerId, removed: &[(usize, Drawable)]) -> Self {
        HistoryAction::Remove {
            drawables: removed.iter().map(|(i, d)| (*i, d.snapshot())).collect(),
            layer_id,
        }
    }

    pub fn modify(layer_id: LayerId, before: &[Drawable], after: &[Drawable]) -> Self {
        HistoryAction::Modify {
            before: snapshots(before),
            after: snapshots(after),
            layer_id,
        }
    }

    pub fn layer_id(&self) -> LayerId {
        match self {
            HistoryAction::Add { layer_id, .. }
            | HistoryAction::Remove { layer_id, .. }
            | HistoryAction::Modify { layer_id, .. } => *layer_id,
        }
    }

    /// Apply the action forward (redo direction).
    fn apply(&self, canvas: &mut Canvas) {
        match self {
            HistoryAction::Add {
                drawables,
                layer_id,
            } => {
                canvas.insert_drawables(*layer_id, snapshots(drawables));
            }
            HistoryAction::Remove {
                drawables,
                layer_id,
            } => {
                let ids: Vec<_> = drawables.iter().map(|(_, d)| d.id()).collect();
                canvas.remove_drawables(*layer_id, &ids);
            }
            HistoryAction::Modify {
                after, layer_id, ..
            } => {
                canvas.replace_drawables(*layer_id, snapshots(after));
            }
        }
    }

    /// Apply the inverse of the action (undo direction).
    fn revert(&self, canvas: &mut Canvas) {
        match self {
            HistoryAction::Add {
                drawables,
                layer_id,
            } => {
                canvas.remove_drawables(*layer_id, &ids(drawables));
            }
            HistoryAction::Remove {
                drawables,
                layer_id,
            } => {
                let restored = drawables.iter().map(|(i, d)| (*i, d.snapshot())).collect();
                canvas.restore_drawables(*layer_id, restored);
            }
            HistoryAction::Modify {
                before, layer_id, ..
            } => {
                canvas.replace_drawables(*layer_id, snapshots(before));
            }
        }
    }
}

/// Ordered action log with a cursor.
///
/// `applied` counts the actions currently in effect; the cursor in the usual
/// sense is `applied - 1`, with "no actions applied" as the empty state.
#[derive(Debug, Clone, Default)]
pub struct History {
    actions: Vec<HistoryAction>,
    applied: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Index of the last applied action.
    pub fn cursor(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.actions.len()
    }

    /// Record a new action, dropping the redo tail and evicting the oldest
    /// entry past [`HISTORY_CAPACITY`].
    pub fn append(&mut self, action: HistoryAction) {
        self.actions.truncate(self.applied);
        self.actions.push(action);
        self.applied += 1;
        if self.actions.len() > HISTORY_CAPACITY {
            self.actions.remove(0);
            self.applied -= 1;
        }
    }

    /// Undo the action at the cursor. Returns false when there is nothing
    /// to undo. An action whose layer no longer exists moves the cursor
    /// without touching the canvas.
    pub fn undo(&mut self, canvas: &mut Canvas) -> bool {
        let Some(index) = self.cursor() else {
            return false;
        };
        let action = &self.actions[index];
        if canvas.layer(action.layer_id()).is_some() {
            action.revert(canvas);
        } else {
            log::debug!("Skipping undo for missing layer {}", action.layer_id());
        }
        self.applied -= 1;
        true
    }

    /// Redo the action after the cursor. Returns false when there is
    /// nothing to redo.
    pub fn redo(&mut self, canvas: &mut Canvas) -> bool {
        let Some(action) = self.actions.get(self.applied) else {
            return false;
        };
        if canvas.layer(action.layer_id()).is_some() {
            action.apply(canvas);
        } else {
            log::debug!("Skipping redo for missing layer {}", action.layer_id());
        }
        self.applied += 1;
        true
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.applied = 0;
    }
}
