//! Bounded undo / redo buffers

use std::collections::VecDeque;

use crate::UndoTransaction;

/// What had to go to make room
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub undo: usize,
    pub redo: usize,
    /// An evicted undo transaction changed the document
    pub lost_modification: bool,
}

impl Eviction {
    pub fn is_empty(&self) -> bool {
        self.undo == 0 && self.redo == 0
    }
}

/// Transaction bookkeeping of one document
///
/// The undo buffer holds the oldest transaction first, the redo buffer the
/// most recently undone one first. Memory of both buffers plus the open
/// transaction never exceeds the budget.
#[derive(Debug)]
pub struct UndoHistory {
    pub(crate) enabled: bool,
    /// Nesting depth of open transactions
    pub(crate) level: usize,
    pub(crate) current: Option<UndoTransaction>,
    /// The open transaction gave up recording after a memory shortage
    pub(crate) without_undo: bool,
    pub(crate) modified_at_start: bool,
    undo_buffer: VecDeque<UndoTransaction>,
    redo_buffer: VecDeque<UndoTransaction>,
    budget: usize,
}

impl UndoHistory {
    pub fn new(budget: usize) -> Self {
        Self {
            enabled: false,
            level: 0,
            current: None,
            without_undo: false,
            modified_at_start: false,
            undo_buffer: VecDeque::new(),
            redo_buffer: VecDeque::new(),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Change the ceiling, evicting whatever no longer fits
    pub fn set_budget(&mut self, budget: usize) -> Eviction {
        self.budget = budget;
        self.enforce_budget()
    }

    pub fn undo_memory(&self) -> usize {
        self.undo_buffer.iter().map(UndoTransaction::undo_size).sum()
    }

    pub fn redo_memory(&self) -> usize {
        self.redo_buffer.iter().map(UndoTransaction::undo_size).sum()
    }

    fn current_memory(&self) -> usize {
        self.current.as_ref().map(UndoTransaction::undo_size).unwrap_or(0)
    }

    /// Memory of both buffers and the open transaction
    pub fn used_memory(&self) -> usize {
        self.undo_memory() + self.redo_memory() + self.current_memory()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_buffer.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_buffer.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_buffer.back().map(UndoTransaction::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_buffer.front().map(UndoTransaction::description)
    }

    /// Any transaction left to undo changes the document
    pub fn any_modification(&self) -> bool {
        self.undo_buffer.iter().any(UndoTransaction::contains_modification)
    }

    pub fn push_undo(&mut self, tx: UndoTransaction) {
        self.undo_buffer.push_back(tx);
    }

    pub fn pop_undo(&mut self) -> Option<UndoTransaction> {
        self.undo_buffer.pop_back()
    }

    pub fn push_redo(&mut self, tx: UndoTransaction) {
        self.redo_buffer.push_front(tx);
    }

    pub fn pop_redo(&mut self) -> Option<UndoTransaction> {
        self.redo_buffer.pop_front()
    }

    /// Returns true if a dropped transaction changed the document
    pub fn flush_undo(&mut self) -> bool {
        let lost = self.any_modification();
        self.undo_buffer.clear();
        lost
    }

    pub fn flush_redo(&mut self) {
        self.redo_buffer.clear();
    }

    fn evict_one(&mut self, eviction: &mut Eviction) -> bool {
        if let Some(tx) = self.undo_buffer.pop_front() {
            eviction.undo += 1;
            eviction.lost_modification |= tx.contains_modification();
            log::debug!("evicted undo transaction '{}'", tx.description());
            true
        } else if let Some(tx) = self.redo_buffer.pop_back() {
            eviction.redo += 1;
            log::debug!("evicted redo transaction '{}'", tx.description());
            true
        } else {
            false
        }
    }

    /// Evict oldest undo, then oldest redo transactions until `needed`
    /// more bytes fit
    ///
    /// Returns `None` without evicting anything if even empty buffers
    /// would not leave enough room.
    pub fn make_room(&mut self, needed: usize) -> Option<Eviction> {
        if self.current_memory().saturating_add(needed) > self.budget {
            return None;
        }
        let mut eviction = Eviction::default();
        while self.used_memory().saturating_add(needed) > self.budget {
            if !self.evict_one(&mut eviction) {
                break;
            }
        }
        Some(eviction)
    }

    /// Evict until the budget holds again
    pub fn enforce_budget(&mut self) -> Eviction {
        let mut eviction = Eviction::default();
        while self.used_memory() > self.budget {
            if !self.evict_one(&mut eviction) {
                break;
            }
        }
        eviction
    }
}
