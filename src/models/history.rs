// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Undo/redo history of annotation mutations.
//!
//! Each record describes one user-undoable mutation together with enough
//! state to apply its inverse, so the history never snapshots the whole
//! annotation list.

use super::annotation::Annotation;

/// A reversible description of one annotation mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryRecord {
    /// An annotation was appended.
    Add { item: Annotation },
    /// An annotation was deleted from position `index`.
    Remove { item: Annotation, index: usize },
    /// An annotation was dragged.
    Move {
        id: String,
        before: Annotation,
        after: Annotation,
    },
    /// A label's text or colour was changed.
    Edit {
        id: String,
        before: Annotation,
        after: Annotation,
    },
}

impl HistoryRecord {
    /// Apply the inverse of this record to `annotations`.
    pub fn revert(&self, annotations: &mut Vec<Annotation>) {
        match self {
            HistoryRecord::Add { item } => annotations.retain(|a| a.id() != item.id()),
            HistoryRecord::Remove { item, index } => {
                let index = (*index).min(annotations.len());
                annotations.insert(index, item.clone());
            }
            HistoryRecord::Move { id, before, .. } | HistoryRecord::Edit { id, before, .. } => {
                replace(annotations, id, before);
            }
        }
    }

    /// Re-apply this record to `annotations`.
    pub fn apply(&self, annotations: &mut Vec<Annotation>) {
        match self {
            HistoryRecord::Add { item } => annotations.push(item.clone()),
            HistoryRecord::Remove { item, .. } => annotations.retain(|a| a.id() != item.id()),
            HistoryRecord::Move { id, after, .. } | HistoryRecord::Edit { id, after, .. } => {
                replace(annotations, id, after);
            }
        }
    }
}

fn replace(annotations: &mut [Annotation], id: &str, with: &Annotation) {
    if let Some(slot) = annotations.iter_mut().find(|a| a.id() == id) {
        *slot = with.clone();
    }
}

/// Linear undo/redo stacks.
#[derive(Debug, Default)]
pub struct History {
    /// Applied mutations, most recent last
    undo_stack: Vec<HistoryRecord>,
    /// Undone mutations, most recently undone last
    redo_stack: Vec<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation that has just been applied.
    pub fn push(&mut self, record: HistoryRecord) {
        self.undo_stack.push(record);
        // A new action invalidates everything that was undone
        self.redo_stack.clear();
    }

    /// Revert the most recent mutation in `annotations`.
    pub fn undo(&mut self, annotations: &mut Vec<Annotation>) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        record.revert(annotations);
        self.redo_stack.push(record);
        true
    }

    /// Re-apply the most recently undone mutation in `annotations`.
    pub fn redo(&mut self, annotations: &mut Vec<Annotation>) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        record.apply(annotations);
        self.undo_stack.push(record);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::annotation::Measurement;

    fn measure(id: &str, x: f32) -> Annotation {
        Annotation::Measurement(Measurement {
            id: id.to_string(),
            x,
            y: 0.0,
            x2: x + 1.0,
            y2: 0.0,
        })
    }

    #[test]
    fn test_undo_remove_restores_original_position() {
        let mut annotations = vec![measure("a1", 0.0), measure("a2", 1.0), measure("a3", 2.0)];
        let removed = annotations.remove(1);
        let mut history = History::new();
        history.push(HistoryRecord::Remove {
            item: removed,
            index: 1,
        });

        assert!(history.undo(&mut annotations));
        let ids: Vec<&str> = annotations.iter().map(|a| a.id()).collect();
        assert_eq!(ids, ["a1", "a2", "a3"]);

        assert!(history.redo(&mut annotations));
        assert_eq!(annotations.len(), 2);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut annotations = vec![measure("a1", 0.0)];
        let mut history = History::new();
        history.push(HistoryRecord::Add {
            item: annotations[0].clone(),
        });
        assert!(history.undo(&mut annotations));
        assert!(history.can_redo());

        history.push(HistoryRecord::Add {
            item: measure("a2", 5.0),
        });
        assert!(!history.can_redo());
        assert!(!history.redo(&mut annotations));
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut annotations = vec![measure("a1", 0.0)];
        let mut history = History::new();
        assert!(!history.undo(&mut annotations));
        assert!(!history.redo(&mut annotations));
        assert_eq!(annotations.len(), 1);
    }

    #[test]
    fn test_move_round_trip() {
        let before = measure("a1", 0.0);
        let after = measure("a1", 10.0);
        let mut annotations = vec![after.clone()];
        let mut history = History::new();
        history.push(HistoryRecord::Move {
            id: "a1".to_string(),
            before: before.clone(),
            after: after.clone(),
        });

        history.undo(&mut annotations);
        assert_eq!(annotations[0], before);
        history.redo(&mut annotations);
        assert_eq!(annotations[0], after);
        assert_eq!(history.undo_depth(), 1);
    }
}
