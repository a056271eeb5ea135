//! Whiteboard replicator: shared element list plus local undo/redo.
//!
//! DESIGN
//! ======
//! Convergence comes from idempotent operations, not from ordering: ADD,
//! UPDATE, and DELETE are keyed by element id, and SYNC replaces the whole
//! list. Any peer may touch any element.
//!
//! Undo history is local and never transmitted. Only its effect travels:
//! undo and redo return a SYNC of the restored state for broadcast, which
//! may clobber a concurrent remote edit. That trade-off is accepted.
//!
//! ERROR HANDLING
//! ==============
//! UPDATE or DELETE of an unknown id is a silent no-op.

use std::collections::VecDeque;

use tracing::debug;

use crate::ids::ElementId;
use crate::state::{WhiteboardAction, WhiteboardElement};

type Snapshot = Vec<WhiteboardElement>;

#[derive(Debug, Clone)]
pub struct Whiteboard {
    elements: Snapshot,
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    limit: usize,
}

impl Whiteboard {
    /// Empty board keeping at most `limit` undo (and redo) snapshots.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { elements: Vec::new(), undo: VecDeque::new(), redo: VecDeque::new(), limit: limit.max(1) }
    }

    #[must_use]
    pub fn elements(&self) -> &[WhiteboardElement] {
        &self.elements
    }

    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&WhiteboardElement> {
        self.elements.iter().find(|e| e.id == *id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    /// Apply a local edit with history, returning the action to broadcast.
    ///
    /// Edits that change nothing (UPDATE of a missing id) leave the history
    /// untouched.
    pub fn apply_local(&mut self, action: WhiteboardAction) -> WhiteboardAction {
        let before = self.elements.clone();
        if apply(&mut self.elements, &action) {
            push_bounded(&mut self.undo, before, self.limit);
            self.redo.clear();
        }
        action
    }

    /// Apply an in-progress edit (drag, resize) without touching history.
    pub fn preview(&mut self, action: WhiteboardAction) -> WhiteboardAction {
        apply(&mut self.elements, &action);
        action
    }

    /// Local "clear board": an undoable empty SYNC.
    pub fn clear(&mut self) -> WhiteboardAction {
        self.apply_local(WhiteboardAction::Sync { data: Vec::new() })
    }

    /// Apply an action received from a peer. Never recorded for undo.
    pub fn apply_remote(&mut self, action: &WhiteboardAction) -> bool {
        apply(&mut self.elements, action)
    }

    /// Restore the previous snapshot. Returns the SYNC to broadcast.
    pub fn undo(&mut self) -> Option<WhiteboardAction> {
        let previous = self.undo.pop_back()?;
        let current = std::mem::replace(&mut self.elements, previous);
        push_bounded(&mut self.redo, current, self.limit);
        Some(self.snapshot())
    }

    /// Re-apply the most recently undone snapshot. Returns the SYNC to broadcast.
    pub fn redo(&mut self) -> Option<WhiteboardAction> {
        let next = self.redo.pop_back()?;
        let current = std::mem::replace(&mut self.elements, next);
        push_bounded(&mut self.undo, current, self.limit);
        Some(self.snapshot())
    }

    /// Full-state SYNC of the current board.
    #[must_use]
    pub fn snapshot(&self) -> WhiteboardAction {
        WhiteboardAction::Sync { data: self.elements.clone() }
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, limit: usize) {
    stack.push_back(snapshot);
    while stack.len() > limit {
        stack.pop_front();
    }
}

/// Apply one action in place. Returns whether the element list changed.
fn apply(elements: &mut Snapshot, action: &WhiteboardAction) -> bool {
    match action {
        WhiteboardAction::Add { data } => {
            if let Some(existing) = elements.iter_mut().find(|e| e.id == data.id) {
                let changed = existing != data;
                existing.clone_from(data);
                changed
            } else {
                elements.push(data.clone());
                true
            }
        }
        WhiteboardAction::Update { data } => {
            let Some(existing) = elements.iter_mut().find(|e| e.id == data.id) else {
                debug!(id = %data.id, "whiteboard: update for unknown element ignored");
                return false;
            };
            let changed = existing != data;
            existing.clone_from(data);
            changed
        }
        WhiteboardAction::Delete { element_id } => {
            let before = elements.len();
            elements.retain(|e| e.id != *element_id);
            if elements.len() == before {
                debug!(id = %element_id, "whiteboard: delete for unknown element ignored");
                return false;
            }
            true
        }
        WhiteboardAction::Sync { data } => {
            let changed = elements != data;
            elements.clone_from(data);
            changed
        }
    }
}

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod tests;
