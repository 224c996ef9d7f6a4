//! Undo transactions: actions undone and redone as one step

use crate::UndoAction;

#[derive(Debug, Default)]
pub struct UndoTransaction {
    description: Option<String>,
    actions: Vec<UndoAction>,
    aborted: bool,
}

impl UndoTransaction {
    pub fn new(description: Option<&str>) -> Self {
        Self {
            description: description.map(str::to_owned),
            actions: Vec::new(),
            aborted: false,
        }
    }

    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    pub fn prepend(&mut self, action: UndoAction) {
        self.actions.insert(0, action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[UndoAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<UndoAction> {
        self.actions
    }

    /// Drop all recorded actions without applying them
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Mark for rollback; the rollback happens when the transaction closes
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Given description, or the unique descriptions of the actions
    ///
    /// Selection snapshots only show up when nothing else is recorded.
    pub fn description(&self) -> String {
        if let Some(description) = &self.description {
            return description.clone();
        }
        let mut names: Vec<&str> = Vec::new();
        for action in self.actions.iter().filter(|a| a.contains_modification()) {
            if !names.contains(&action.description()) {
                names.push(action.description());
            }
        }
        if names.is_empty() && !self.actions.is_empty() {
            names.push("Selection");
        }
        names.join(", ")
    }

    pub fn override_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn undo_size(&self) -> usize {
        self.actions.iter().map(UndoAction::undo_size).sum()
    }

    pub fn redo_size(&self) -> usize {
        self.actions.iter().map(UndoAction::redo_size).sum()
    }

    pub fn contains_modification(&self) -> bool {
        self.actions.iter().any(UndoAction::contains_modification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UndoDeleteRange, UndoInsertRange, UndoSelection};
    use sf_core::TrackId;

    fn delete() -> UndoAction {
        UndoAction::DeleteRange(UndoDeleteRange::new(TrackId(1), 0, 10))
    }

    fn insert() -> UndoAction {
        UndoAction::InsertRange(UndoInsertRange::new(TrackId(1), 0, 10))
    }

    #[test]
    fn test_description_unique_in_order() {
        let mut tx = UndoTransaction::new(None);
        tx.push(UndoAction::Selection(UndoSelection::new()));
        tx.push(insert());
        tx.push(delete());
        tx.push(insert());
        assert_eq!(tx.description(), "Insert, Delete");
    }

    #[test]
    fn test_description_override_and_selection_only() {
        let mut tx = UndoTransaction::new(Some("Paste"));
        tx.push(insert());
        assert_eq!(tx.description(), "Paste");

        let mut sel = UndoTransaction::new(None);
        assert_eq!(sel.description(), "");
        sel.push(UndoAction::Selection(UndoSelection::new()));
        assert_eq!(sel.description(), "Selection");
        assert!(!sel.contains_modification());
    }

    #[test]
    fn test_prepend_and_abort() {
        let mut tx = UndoTransaction::new(None);
        tx.push(delete());
        tx.prepend(insert());
        assert_eq!(tx.actions()[0].description(), "Insert");
        assert_eq!(tx.len(), 2);
        assert!(!tx.is_aborted());
        tx.abort();
        assert!(tx.is_aborted());
        assert_eq!(tx.undo_size(), tx.actions().iter().map(|a| a.undo_size()).sum::<usize>());
    }
}
