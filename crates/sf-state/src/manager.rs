//! Signal manager: one open document
//!
//! Owns the [`Signal`], the selection, the file info and the undo history.
//! Every mutating operation runs inside an undo transaction:
//! - the outermost `start_undo_transaction()` drops the redo buffer and
//!   records the current selection as the first action
//! - mutations register their inverse action before (deletions,
//!   overwrites) or right after (insertions) touching the signal
//! - closing the outermost level commits the transaction to the undo
//!   buffer, or rolls it back if it was aborted
//!
//! Transaction bookkeeping sits behind a re-entrant lock, so nested
//! transaction scopes on one thread are fine. The lock is never held
//! across decoder or encoder calls.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use sf_core::{Sample, SampleRange, SfError, SfResult, TrackId};
use sf_file::{Decoder, Encoder, FileInfo, MultiTrackReader, MultiTrackWriter, TransferProgress};
use sf_signal::{
    InsertMode, ReaderMode, SampleReader, SampleWriter, Signal, SignalEvent, SignalEventSink, Track,
};

use crate::events::Listeners;
use crate::undo::clip_length;
use crate::{
    ClipBoard, DefaultPolicy, DocumentEvent, DocumentListener, DocumentStatus, EditorPreferences,
    Eviction, Selection, SelectionState, UndoAction, UndoDeleteRange, UndoDeleteTrack,
    UndoFileInfo, UndoHistory, UndoInsertRange, UndoInsertTrack, UndoModifyRange, UndoSelection,
    UndoTransaction, UserPolicy,
};

/// Change applied to one track's selection flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelect {
    On,
    Off,
    Toggle,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED STATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct ModifiedState {
    modified: bool,
    /// Cleared while loading or closing, pins `modified`
    change_enabled: bool,
    /// The unmodified state can not be reached by undo any more
    latched: bool,
    /// Undo recording is active
    recording: bool,
}

/// State the signal's event sink needs, shared with the manager
struct Shared {
    listeners: Listeners,
    state: Mutex<ModifiedState>,
}

impl Shared {
    fn is_modified(&self) -> bool {
        self.state.lock().modified
    }

    fn set_modified(&self, modified: bool) {
        {
            let mut state = self.state.lock();
            if !state.change_enabled || state.modified == modified {
                return;
            }
            if !modified && state.latched {
                return;
            }
            state.modified = modified;
        }
        self.listeners.notify(&DocumentEvent::ModifiedChanged(modified));
    }

    /// Clear the flag regardless of the latch
    fn reset_modified(&self) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.modified, false)
        };
        if changed {
            self.listeners.notify(&DocumentEvent::ModifiedChanged(false));
        }
    }

    fn latch(&self) {
        let mut state = self.state.lock();
        if !state.latched {
            log::debug!("document can no longer become unmodified");
            state.latched = true;
        }
    }

    fn enable_modified_change(&self, enabled: bool) {
        self.state.lock().change_enabled = enabled;
    }
}

impl SignalEventSink for Shared {
    fn signal_event(&self, event: &SignalEvent) {
        if event.is_modification() {
            {
                let mut state = self.state.lock();
                if state.change_enabled && !state.recording {
                    state.latched = true;
                }
            }
            self.set_modified(true);
        }
        self.listeners.notify(&DocumentEvent::Signal(event.clone()));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION GUARD
// ═══════════════════════════════════════════════════════════════════════════════

/// Closes the transaction it opened exactly once, on drop
#[must_use = "the transaction closes when the guard is dropped"]
pub struct UndoTransactionGuard<'a> {
    manager: &'a SignalManager,
    active: bool,
}

impl UndoTransactionGuard<'_> {
    /// Whether a transaction level was actually opened
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Roll back everything recorded in the transaction when it closes
    pub fn abort(&self) {
        if self.active {
            self.manager.abort_undo_transaction();
        }
    }
}

impl Drop for UndoTransactionGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            self.manager.close_undo_transaction();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNAL MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SignalManager {
    signal: Signal,
    history: ReentrantMutex<RefCell<UndoHistory>>,
    selection: Mutex<Selection>,
    /// Selection right after the last committed transaction
    last_selection: Mutex<Option<SelectionState>>,
    file_info: RwLock<FileInfo>,
    shared: Arc<Shared>,
    clipboard: Arc<ClipBoard>,
    policy: Arc<dyn UserPolicy>,
    preferences: RwLock<EditorPreferences>,
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalManager {
    pub fn new() -> Self {
        Self::with_preferences(EditorPreferences::default())
    }

    pub fn with_preferences(preferences: EditorPreferences) -> Self {
        let enabled = preferences.undo.enabled_on_start;
        let mut history = UndoHistory::new(preferences.undo_budget_bytes());
        history.enabled = enabled;

        let shared = Arc::new(Shared {
            listeners: Listeners::default(),
            state: Mutex::new(ModifiedState {
                modified: false,
                change_enabled: true,
                latched: false,
                recording: enabled,
            }),
        });
        let signal = Signal::new();
        signal.set_event_sink(Arc::clone(&shared) as Arc<dyn SignalEventSink>);

        Self {
            signal,
            history: ReentrantMutex::new(RefCell::new(history)),
            selection: Mutex::new(Selection::default()),
            last_selection: Mutex::new(None),
            file_info: RwLock::new(FileInfo::default()),
            shared,
            clipboard: Arc::new(ClipBoard::new()),
            policy: Arc::new(DefaultPolicy),
            preferences: RwLock::new(preferences),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn UserPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Share a clipboard between documents
    pub fn with_clipboard(mut self, clipboard: Arc<ClipBoard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn clipboard(&self) -> &Arc<ClipBoard> {
        &self.clipboard
    }

    pub fn preferences(&self) -> EditorPreferences {
        self.preferences.read().clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn DocumentListener>) {
        self.shared.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DocumentListener>) {
        self.shared.listeners.remove(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    fn notify(&self, event: DocumentEvent) {
        self.shared.listeners.notify(&event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DOCUMENT STATE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_modified(&self) -> bool {
        self.shared.is_modified()
    }

    /// Clearing is refused once the document can no longer return to its
    /// unmodified state
    pub fn set_modified(&self, modified: bool) {
        self.shared.set_modified(modified);
    }

    /// Document length in samples (longest track)
    pub fn length(&self) -> u64 {
        self.signal.length()
    }

    pub fn track_count(&self) -> usize {
        self.signal.track_count()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    pub fn status(&self) -> DocumentStatus {
        let info = self.file_info.read();
        DocumentStatus {
            length: self.signal.length(),
            tracks: self.signal.track_count(),
            rate: info.rate,
            bits: info.bits,
        }
    }

    fn emit_status(&self) {
        self.notify(DocumentEvent::Status(self.status()));
    }

    pub fn file_info(&self) -> FileInfo {
        self.file_info.read().clone()
    }

    pub(crate) fn swap_file_info(&self, info: FileInfo) -> FileInfo {
        let previous = std::mem::replace(&mut *self.file_info.write(), info);
        self.emit_status();
        previous
    }

    /// Undoable metadata change
    pub fn set_file_info(&self, info: FileInfo) -> SfResult<()> {
        self.with_transaction("File Info", |m| {
            m.register_undo_action(UndoAction::FileInfo(UndoFileInfo::new(m.file_info())))?;
            m.swap_file_info(info);
            m.shared.set_modified(true);
            Ok(())
        })
    }

    fn track_checked(&self, index: usize) -> SfResult<Arc<Track>> {
        self.signal.track(index).ok_or_else(|| {
            SfError::range(format!(
                "track index {} >= track count {}",
                index,
                self.signal.track_count()
            ))
        })
    }

    fn tracks_checked(&self, tracks: &[usize]) -> SfResult<Vec<Arc<Track>>> {
        tracks.iter().map(|&index| self.track_checked(index)).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SELECTION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn selection(&self) -> Selection {
        *self.selection.lock()
    }

    pub fn selected_tracks(&self) -> Vec<usize> {
        self.signal.selected_tracks()
    }

    /// Selected range plus the identities of the selected tracks
    pub fn selection_state(&self) -> SelectionState {
        let range = self.selection();
        let tracks = self
            .signal
            .selected_tracks()
            .into_iter()
            .filter_map(|index| self.signal.track(index).map(|t| t.id()))
            .collect();
        SelectionState { range, tracks }
    }

    fn store_selection(&self, selection: Selection) {
        let changed = {
            let mut current = self.selection.lock();
            std::mem::replace(&mut *current, selection) != selection
        };
        if changed {
            self.notify(DocumentEvent::SelectionChanged(selection));
        }
    }

    /// Restore a snapshot without clamping, used while replaying history
    pub(crate) fn apply_selection_state(&self, state: &SelectionState) {
        self.store_selection(state.range);
        for (index, id) in self.signal.track_ids().into_iter().enumerate() {
            if let Err(err) = self.signal.select_track(index, state.tracks.contains(&id)) {
                log::warn!("restoring selection of {}: {}", id, err);
            }
        }
    }

    fn clamp_selection(&self) {
        let clamped = self.selection().clamped(self.signal.length());
        self.store_selection(clamped);
    }

    /// Select `[offset, offset + length)`, clamped to the signal
    pub fn select_range(&self, offset: u64, length: u64) {
        self.store_selection(Selection::new(offset, length).clamped(self.signal.length()));
    }

    pub fn select_all(&self) {
        self.select_range(0, self.signal.length());
    }

    /// Keep the cursor position, drop the range
    pub fn select_none(&self) {
        let offset = self.selection().offset;
        self.select_range(offset, 0);
    }

    pub fn select_track(&self, index: usize, how: TrackSelect) -> SfResult<()> {
        let selected = match how {
            TrackSelect::On => true,
            TrackSelect::Off => false,
            TrackSelect::Toggle => !self.track_checked(index)?.selected(),
        };
        self.signal.select_track(index, selected)?;
        Ok(())
    }

    pub fn select_all_tracks(&self) -> SfResult<()> {
        for index in self.signal.all_tracks() {
            self.signal.select_track(index, true)?;
        }
        Ok(())
    }

    pub fn invert_track_selection(&self) -> SfResult<()> {
        for index in self.signal.all_tracks() {
            self.select_track(index, TrackSelect::Toggle)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UNDO CONFIGURATION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn undo_enabled(&self) -> bool {
        self.history.lock().borrow().enabled
    }

    pub fn enable_undo(&self) {
        let lock = self.history.lock();
        {
            let mut h = lock.borrow_mut();
            if h.enabled {
                return;
            }
            h.enabled = true;
            self.drop_undo_buffer(&mut h);
            h.flush_redo();
        }
        self.shared.state.lock().recording = true;
        log::debug!("undo enabled");
        self.notify_undo_redo();
    }

    /// Stop recording and drop all history
    ///
    /// # Panics
    /// If called while a transaction is open.
    pub fn disable_undo(&self) {
        let lock = self.history.lock();
        {
            let mut h = lock.borrow_mut();
            assert!(h.level == 0, "undo can not be disabled inside an undo transaction");
            if !h.enabled {
                return;
            }
            self.drop_undo_buffer(&mut h);
            h.flush_redo();
            h.enabled = false;
        }
        self.shared.state.lock().recording = false;
        log::debug!("undo disabled");
        self.notify_undo_redo();
    }

    pub fn undo_memory_budget(&self) -> usize {
        self.history.lock().borrow().budget()
    }

    /// Change the undo budget, evicting history that no longer fits
    pub fn set_undo_memory_budget(&self, bytes: usize) {
        let lock = self.history.lock();
        let eviction = lock.borrow_mut().set_budget(bytes);
        self.apply_eviction(eviction);
    }

    pub fn used_undo_memory(&self) -> usize {
        self.history.lock().borrow().used_memory()
    }

    pub fn undo_count(&self) -> usize {
        self.history.lock().borrow().undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.lock().borrow().redo_count()
    }

    pub fn can_undo(&self) -> bool {
        let lock = self.history.lock();
        let h = lock.borrow();
        h.enabled && h.undo_count() > 0
    }

    pub fn can_redo(&self) -> bool {
        let lock = self.history.lock();
        let h = lock.borrow();
        h.enabled && h.redo_count() > 0
    }

    pub fn undo_description(&self) -> Option<String> {
        self.history.lock().borrow().undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.history.lock().borrow().redo_description()
    }

    /// Nesting depth of open transactions, zero when idle
    pub fn transaction_level(&self) -> usize {
        self.history.lock().borrow().level
    }

    pub fn flush_undo_buffers(&self) {
        let lock = self.history.lock();
        {
            let mut h = lock.borrow_mut();
            self.drop_undo_buffer(&mut h);
            h.flush_redo();
        }
        self.notify_undo_redo();
    }

    pub fn flush_redo_buffer(&self) {
        let lock = self.history.lock();
        lock.borrow_mut().flush_redo();
        self.notify_undo_redo();
    }

    fn drop_undo_buffer(&self, history: &mut UndoHistory) {
        if history.flush_undo() {
            self.shared.latch();
        }
    }

    fn apply_eviction(&self, eviction: Eviction) {
        if eviction.lost_modification {
            self.shared.latch();
        }
        if !eviction.is_empty() {
            self.notify_undo_redo();
        }
    }

    fn notify_undo_redo(&self) {
        let (undo, redo) = {
            let lock = self.history.lock();
            let h = lock.borrow();
            (h.undo_description(), h.redo_description())
        };
        self.notify(DocumentEvent::UndoRedoChanged { undo, redo });
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRANSACTIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Open a transaction level; returns false while undo is disabled
    ///
    /// Every `true` must be paired with one `close_undo_transaction()`.
    /// Prefer [`SignalManager::transaction`].
    pub fn start_undo_transaction(&self, description: Option<&str>) -> bool {
        let lock = self.history.lock();
        {
            let mut h = lock.borrow_mut();
            if !h.enabled {
                return false;
            }
            h.level += 1;
            if h.level > 1 {
                return true;
            }
            h.flush_redo();
            h.current = Some(UndoTransaction::new(description));
            h.without_undo = false;
            h.modified_at_start = self.shared.is_modified();
        }
        log::debug!("undo transaction opened: {:?}", description);
        let snapshot = UndoSelection::with_state(self.selection_state());
        if let Err(err) = self.register_undo_action(UndoAction::Selection(snapshot)) {
            log::warn!("no selection snapshot for transaction: {}", err);
        }
        self.notify_undo_redo();
        true
    }

    /// Scoped transaction, closed when the guard drops
    pub fn transaction(&self, description: &str) -> UndoTransactionGuard<'_> {
        UndoTransactionGuard {
            manager: self,
            active: self.start_undo_transaction(Some(description)),
        }
    }

    /// Run `f` inside a transaction, rolling it back if `f` fails
    pub fn with_transaction<T>(
        &self,
        description: &str,
        f: impl FnOnce(&Self) -> SfResult<T>,
    ) -> SfResult<T> {
        let guard = self.transaction(description);
        let result = f(self);
        if result.is_err() {
            guard.abort();
        }
        result
    }

    pub fn abort_undo_transaction(&self) {
        let lock = self.history.lock();
        if let Some(tx) = lock.borrow_mut().current.as_mut() {
            tx.abort();
        }
    }

    /// Leave one transaction level, committing or rolling back at the last
    ///
    /// # Panics
    /// If no transaction is open.
    pub fn close_undo_transaction(&self) {
        let lock = self.history.lock();
        let (tx, modified_at_start) = {
            let mut h = lock.borrow_mut();
            assert!(h.level > 0, "closing an undo transaction that is not open");
            h.level -= 1;
            if h.level > 0 {
                return;
            }
            h.without_undo = false;
            (h.current.take(), h.modified_at_start)
        };

        if let Some(tx) = tx {
            if tx.is_aborted() {
                log::debug!("rolling back '{}'", tx.description());
                for action in tx.into_actions().into_iter().rev() {
                    if let Err(err) = action.undo(self, false) {
                        log::warn!("rollback step failed: {}", err);
                    }
                }
                self.clamp_selection();
                self.shared.set_modified(modified_at_start);
            } else if self.is_discardable(&tx) {
                log::debug!("discarding transaction without effect");
            } else {
                log::debug!("committed '{}' ({} bytes)", tx.description(), tx.undo_size());
                lock.borrow_mut().push_undo(tx);
            }
        }
        *self.last_selection.lock() = Some(self.selection_state());
        self.notify_undo_redo();
    }

    /// Empty, or a selection snapshot of a selection that did not change
    fn is_discardable(&self, tx: &UndoTransaction) -> bool {
        match tx.actions() {
            [] => true,
            [UndoAction::Selection(snapshot)] => *snapshot.state() == self.selection_state(),
            _ => false,
        }
    }

    /// Selection right after the last committed transaction
    pub fn last_selection(&self) -> Option<SelectionState> {
        self.last_selection.lock().clone()
    }

    /// Add an action to the open transaction
    ///
    /// A no-op while undo is disabled or no transaction is open. If the
    /// action does not fit the budget the user policy decides: continue
    /// without undo, or abort the transaction and return
    /// [`SfError::Aborted`]. Callers perform their mutation only on `Ok`.
    pub fn register_undo_action(&self, mut action: UndoAction) -> SfResult<()> {
        let lock = self.history.lock();
        let size = action.undo_size();
        let room = {
            let mut h = lock.borrow_mut();
            if !h.enabled || h.current.is_none() || h.without_undo {
                return Ok(());
            }
            if size > h.budget() { None } else { h.make_room(size) }
        };
        let Some(eviction) = room else {
            log::warn!(
                "'{}' needs {} bytes, undo budget is {} bytes",
                action.description(),
                size,
                self.undo_memory_budget()
            );
            return self.continue_without_undo();
        };
        self.apply_eviction(eviction);

        if let Err(err) = action.store(self) {
            log::warn!("storing undo data for '{}' failed: {}", action.description(), err);
            return self.continue_without_undo();
        }
        if let Some(tx) = lock.borrow_mut().current.as_mut() {
            tx.push(action);
        }
        Ok(())
    }

    fn continue_without_undo(&self) -> SfResult<()> {
        let lock = self.history.lock();
        if self.policy.confirm_continue_without_undo() {
            {
                let mut h = lock.borrow_mut();
                if let Some(tx) = h.current.as_mut() {
                    tx.clear();
                }
                h.without_undo = true;
                self.drop_undo_buffer(&mut h);
                h.flush_redo();
            }
            self.shared.latch();
            self.shared.set_modified(true);
            log::warn!("continuing without undo");
            self.notify_undo_redo();
            Ok(())
        } else {
            if let Some(tx) = lock.borrow_mut().current.as_mut() {
                tx.abort();
            }
            log::warn!("operation aborted, not enough undo memory");
            Err(SfError::Aborted)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UNDO / REDO
    // ═══════════════════════════════════════════════════════════════════════

    /// Revert the most recent transaction
    ///
    /// Returns false if there was nothing to undo.
    pub fn undo(&self) -> SfResult<bool> {
        let lock = self.history.lock();
        let (tx, with_redo, eviction) = {
            let mut h = lock.borrow_mut();
            if !h.enabled {
                return Ok(false);
            }
            if h.level > 0 {
                return Err(SfError::State("undo inside an open transaction".into()));
            }
            let Some(tx) = h.pop_undo() else {
                return Ok(false);
            };
            match h.make_room(tx.redo_size()) {
                Some(eviction) => (tx, true, eviction),
                None => {
                    // a partial redo history is worthless
                    h.flush_redo();
                    (tx, false, Eviction::default())
                }
            }
        };
        self.apply_eviction(eviction);

        let description = tx.description();
        log::debug!("undo '{}'", description);
        let mut redo = UndoTransaction::new(tx.override_description());
        let mut redo_complete = with_redo;
        let mut result = Ok(true);
        for action in tx.into_actions().into_iter().rev() {
            match action.undo(self, with_redo) {
                Ok(Some(inverse)) => redo.prepend(inverse),
                Ok(None) => redo_complete &= !with_redo,
                Err(err) => {
                    log::warn!("undo of '{}' failed: {}", description, err);
                    redo_complete = false;
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        self.clamp_selection();

        {
            let mut h = lock.borrow_mut();
            if !redo_complete {
                h.flush_redo();
            } else if redo.len() >= 2 {
                h.push_redo(redo);
            }
            let eviction = h.enforce_budget();
            let any_modification = h.any_modification();
            drop(h);
            self.apply_eviction(eviction);
            self.shared.set_modified(any_modification);
        }
        self.notify_undo_redo();
        result
    }

    /// Re-apply the most recently undone transaction
    pub fn redo(&self) -> SfResult<bool> {
        let lock = self.history.lock();
        let (tx, with_undo, eviction) = {
            let mut h = lock.borrow_mut();
            if !h.enabled {
                return Ok(false);
            }
            if h.level > 0 {
                return Err(SfError::State("redo inside an open transaction".into()));
            }
            let Some(tx) = h.pop_redo() else {
                return Ok(false);
            };
            match h.make_room(tx.redo_size()) {
                Some(eviction) => (tx, true, eviction),
                None => {
                    self.drop_undo_buffer(&mut h);
                    (tx, false, Eviction::default())
                }
            }
        };
        self.apply_eviction(eviction);

        let description = tx.description();
        log::debug!("redo '{}'", description);
        let mut undo = UndoTransaction::new(tx.override_description());
        let mut undo_complete = with_undo;
        let mut result = Ok(true);
        for action in tx.into_actions() {
            match action.undo(self, with_undo) {
                Ok(Some(inverse)) => undo.push(inverse),
                Ok(None) => undo_complete &= !with_undo,
                Err(err) => {
                    log::warn!("redo of '{}' failed: {}", description, err);
                    undo_complete = false;
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        self.clamp_selection();

        {
            let mut h = lock.borrow_mut();
            if !undo_complete {
                self.drop_undo_buffer(&mut h);
                h.flush_redo();
            } else if !undo.is_empty() {
                h.push_undo(undo);
            }
            let eviction = h.enforce_budget();
            let any_modification = h.any_modification();
            drop(h);
            self.apply_eviction(eviction);
            self.shared.set_modified(any_modification);
        }
        self.notify_undo_redo();
        result
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SAMPLE EDITING
    // ═══════════════════════════════════════════════════════════════════════

    /// Delete `[offset, offset + length)` from the given tracks
    ///
    /// Tracks shorter than the range lose only what they have.
    pub fn delete_range(&self, offset: u64, length: u64, tracks: &[usize]) -> SfResult<()> {
        self.with_transaction("Delete", |m| {
            m.delete_range_in(offset, length, tracks)?;
            m.clamp_selection();
            Ok(())
        })
    }

    pub(crate) fn delete_range_in(&self, offset: u64, length: u64, tracks: &[usize]) -> SfResult<()> {
        if length == 0 {
            return Ok(());
        }
        SampleRange::new(offset, length).check_within(self.signal.length())?;
        let checked = self.tracks_checked(tracks)?;
        for (&index, track) in tracks.iter().zip(&checked) {
            let n = clip_length(offset, length, track.length());
            if n == 0 {
                continue;
            }
            self.register_undo_action(UndoAction::DeleteRange(UndoDeleteRange::new(
                track.id(),
                offset,
                n,
            )))?;
            self.signal.delete_range(index, offset, n)?;
        }
        Ok(())
    }

    /// Open a gap of `length` zero samples at `offset` in the given tracks
    pub fn insert_space(&self, offset: u64, length: u64, tracks: &[usize]) -> SfResult<()> {
        self.with_transaction("Insert Silence", |m| m.insert_space_in(offset, length, tracks))
    }

    pub(crate) fn insert_space_in(&self, offset: u64, length: u64, tracks: &[usize]) -> SfResult<()> {
        if length == 0 {
            return Ok(());
        }
        let checked = self.tracks_checked(tracks)?;
        if let Some(track) = checked.iter().find(|t| t.length() < offset) {
            return Err(SfError::range(format!(
                "insert at {} behind end of {} ({})",
                offset,
                track.id(),
                track.length()
            )));
        }
        for (&index, track) in tracks.iter().zip(&checked) {
            self.signal.insert_space(index, offset, length)?;
            self.register_inserted(index, track.id(), offset, length)?;
        }
        Ok(())
    }

    /// Insert samples into one track before `offset`
    pub fn insert_samples(&self, track: usize, offset: u64, samples: &[Sample]) -> SfResult<()> {
        self.with_transaction("Insert", |m| m.insert_samples_in(track, offset, samples))
    }

    pub(crate) fn insert_samples_in(&self, index: usize, offset: u64, samples: &[Sample]) -> SfResult<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let track = self.track_checked(index)?;
        self.signal.insert_samples(index, offset, samples)?;
        self.register_inserted(index, track.id(), offset, samples.len() as u64)
    }

    /// Replace samples of one track in place
    pub fn overwrite_samples(&self, track: usize, offset: u64, samples: &[Sample]) -> SfResult<()> {
        self.with_transaction("Modify", |m| {
            if samples.is_empty() {
                return Ok(());
            }
            let t = m.track_checked(track)?;
            SampleRange::new(offset, samples.len() as u64).check_within(t.length())?;
            m.register_undo_action(UndoAction::ModifyRange(UndoModifyRange::new(
                t.id(),
                offset,
                samples.len() as u64,
            )))?;
            m.signal.overwrite_samples(track, offset, samples)
        })
    }

    /// Record an insertion that already happened, removing it again if
    /// it can not be recorded
    fn register_inserted(&self, index: usize, id: TrackId, offset: u64, length: u64) -> SfResult<()> {
        let action = UndoAction::InsertRange(UndoInsertRange::new(id, offset, length));
        if let Err(err) = self.register_undo_action(action) {
            if let Err(rollback) = self.signal.delete_range(index, offset, length) {
                log::warn!("removing unrecorded insert on {}: {}", id, rollback);
            }
            return Err(err);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRACKS
    // ═══════════════════════════════════════════════════════════════════════

    /// Append a silent track as long as the signal, returning its index
    pub fn append_track(&self) -> SfResult<usize> {
        self.insert_track(self.signal.track_count())
    }

    /// Insert a silent track before `index`
    pub fn insert_track(&self, index: usize) -> SfResult<usize> {
        self.with_transaction("Insert Track", |m| m.insert_track_in(index))
    }

    pub(crate) fn insert_track_in(&self, index: usize) -> SfResult<usize> {
        let track = self.signal.insert_track(index, self.signal.length())?;
        let action = UndoAction::InsertTrack(UndoInsertTrack::new(index, track.id()));
        if let Err(err) = self.register_undo_action(action) {
            if let Err(rollback) = self.signal.delete_track(index) {
                log::warn!("removing unrecorded track {}: {}", track.id(), rollback);
            }
            return Err(err);
        }
        self.emit_status();
        Ok(index)
    }

    pub fn delete_track(&self, index: usize) -> SfResult<()> {
        self.with_transaction("Delete Track", |m| {
            let track = m.track_checked(index)?;
            m.register_undo_action(UndoAction::DeleteTrack(UndoDeleteTrack::new(
                index,
                track.id(),
                track.length(),
            )))?;
            drop(track);
            m.signal.delete_track(index)?;
            m.clamp_selection();
            m.emit_status();
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STREAMING ACCESS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn open_reader(
        &self,
        mode: ReaderMode,
        track: usize,
        left: u64,
        right: u64,
    ) -> SfResult<SampleReader> {
        self.signal.open_reader(mode, track, left, right)
    }

    /// Writer whose changes are recorded in the open transaction
    ///
    /// While undo is enabled a transaction must be open, otherwise the
    /// writes could not be undone and [`SfError::State`] is returned.
    ///
    /// The writer must be dropped before the transaction closes. It holds
    /// an exclusive range lock on its track, so a structural edit of the
    /// same track from the same thread (`delete_range`, `insert_space`,
    /// `delete_track`, ...) while the writer is alive blocks forever.
    pub fn open_writer(
        &self,
        mode: InsertMode,
        track: usize,
        left: u64,
        right: u64,
    ) -> SfResult<SampleWriter> {
        {
            let lock = self.history.lock();
            let h = lock.borrow();
            if h.enabled && h.level == 0 {
                return Err(SfError::State("writer opened outside of an undo transaction".into()));
            }
        }
        let t = self.track_checked(track)?;
        let capacity = self.preferences.read().io.writer_buffer_samples;
        let writer = match mode {
            InsertMode::Overwrite => {
                if right < left {
                    return Err(SfError::range(format!("overwrite range [{}, {}]", left, right)));
                }
                let length = t.length();
                let needed = right.saturating_add(1);
                if length < needed {
                    self.signal.insert_space(track, length, needed - length)?;
                    self.register_inserted(track, t.id(), length, needed - length)?;
                }
                self.register_undo_action(UndoAction::ModifyRange(UndoModifyRange::new(
                    t.id(),
                    left,
                    right - left + 1,
                )))?;
                self.signal.open_writer(mode, track, left, right)?
            }
            InsertMode::Append | InsertMode::Insert => {
                let offset = if mode == InsertMode::Append { t.length() } else { left };
                let observer = Arc::new(AtomicU64::new(0));
                let writer = self.signal.open_writer(mode, track, left, right)?;
                self.register_undo_action(UndoAction::InsertRange(
                    UndoInsertRange::with_length_observer(t.id(), offset, Arc::clone(&observer)),
                ))?;
                writer.with_length_observer(observer)
            }
        };
        Ok(writer.with_buffer_capacity(capacity))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DOCUMENT LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Drop the document and all history
    ///
    /// # Panics
    /// If called while a transaction is open.
    pub fn close(&self) {
        self.disable_undo();
        self.shared.enable_modified_change(false);
        self.signal.close();
        self.shared.enable_modified_change(true);

        *self.file_info.write() = FileInfo::default();
        *self.last_selection.lock() = None;
        self.store_selection(Selection::default());
        if !self.preferences.read().clipboard.keep_after_close {
            self.clipboard.clear();
        }
        self.shared.state.lock().latched = false;
        self.shared.reset_modified();
        log::info!("document closed");
        self.emit_status();
    }

    /// Start a new document of silent tracks
    pub fn new_signal(&self, length: u64, rate: f64, bits: u32, tracks: usize) -> SfResult<()> {
        self.close();
        self.shared.enable_modified_change(false);
        let result = (0..tracks).try_for_each(|_| self.signal.append_track(length).map(|_| ()));
        self.shared.enable_modified_change(true);
        if let Err(err) = result {
            self.close();
            return Err(err);
        }
        *self.file_info.write() = FileInfo::new(length, tracks, rate, bits);
        self.start_session();
        log::info!(
            "new signal: {} tracks x {} samples, {} Hz, {} bit",
            tracks,
            length,
            rate,
            bits
        );
        self.emit_status();
        Ok(())
    }

    fn start_session(&self) {
        self.shared.reset_modified();
        if self.preferences.read().undo.enabled_on_start {
            self.enable_undo();
        }
    }

    /// Replace the document with what `decoder` reads from `source`
    ///
    /// A failed load leaves the document closed. A cancelled load keeps
    /// whatever arrived until then.
    pub fn load(
        &self,
        decoder: &mut dyn Decoder,
        source: Box<dyn Read + Send>,
        progress: &TransferProgress,
    ) -> SfResult<()> {
        self.close();
        let mut info = decoder.open(source)?;
        log::info!(
            "loading {} tracks, {} Hz, {} bit via {}",
            info.tracks,
            info.rate,
            info.bits,
            decoder.name()
        );

        self.shared.enable_modified_change(false);
        let result = self.decode_into(decoder, info.tracks, progress);
        decoder.close();
        self.shared.enable_modified_change(true);
        match result {
            Ok(()) => {}
            Err(SfError::Cancelled) => {
                log::warn!("load cancelled after {} samples", self.signal.length());
            }
            Err(err) => {
                log::warn!("load failed: {}", err);
                self.close();
                return Err(err);
            }
        }

        info.length = self.signal.length();
        info.tracks = self.signal.track_count();
        *self.file_info.write() = info;
        self.start_session();
        self.emit_status();
        Ok(())
    }

    fn decode_into(
        &self,
        decoder: &mut dyn Decoder,
        tracks: usize,
        progress: &TransferProgress,
    ) -> SfResult<()> {
        let capacity = self.preferences.read().io.writer_buffer_samples;
        let mut writers = Vec::with_capacity(tracks);
        for index in 0..tracks {
            self.signal.append_track(0)?;
            let writer = self
                .signal
                .open_writer(InsertMode::Append, index, 0, 0)?
                .with_buffer_capacity(capacity)
                .with_cancel_flag(progress.cancel_flag());
            writers.push(writer);
        }
        let mut dst = MultiTrackWriter::new(writers);
        decoder.decode(&mut dst, progress)?;
        dst.finish()
    }

    /// Hand the document, or the selection, to `encoder`
    ///
    /// Declining the lossy save prompt returns [`SfError::Aborted`]. A
    /// failed save leaves the document and its modified flag untouched.
    pub fn save(
        &self,
        encoder: &mut dyn Encoder,
        dst: &mut dyn Write,
        selection_only: bool,
        progress: &TransferProgress,
    ) -> SfResult<()> {
        let mut info = self.file_info();
        let lost = info.unsupported_by(&encoder.supported_properties());
        if !lost.is_empty() {
            log::warn!("{} can not store {:?}", encoder.name(), lost);
            if !self.policy.confirm_lossy_save(&lost) {
                return Err(SfError::Aborted);
            }
        }

        let (tracks, offset, length) = if selection_only {
            let selection = self.selection();
            (self.signal.selected_tracks(), selection.offset, selection.length)
        } else {
            (self.signal.all_tracks(), 0, self.signal.length())
        };
        if tracks.is_empty() {
            return Err(SfError::State("no tracks to save".into()));
        }
        let range = SampleRange::new(offset, length);
        let readers = tracks
            .iter()
            .map(|&t| self.signal.open_range_reader(ReaderMode::SinglePassForward, t, range))
            .collect::<SfResult<Vec<_>>>()?;
        let mut src = MultiTrackReader::new(readers);

        info.length = length;
        info.tracks = tracks.len();
        encoder.encode(&mut src, dst, &info, progress)?;
        drop(src);

        if !selection_only {
            self.shared.reset_modified();
        }
        log::info!("saved {} tracks x {} samples via {}", info.tracks, length, encoder.name());
        self.emit_status();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrictPolicy;

    fn manager(tracks: usize, length: u64) -> SignalManager {
        let m = SignalManager::new();
        m.new_signal(length, 48000.0, 24, tracks).unwrap();
        m
    }

    fn ramp(n: usize) -> Vec<Sample> {
        (0..n as Sample).collect()
    }

    #[test]
    fn test_new_signal_state() {
        let m = manager(2, 1000);
        assert_eq!(m.track_count(), 2);
        assert_eq!(m.length(), 1000);
        assert!(!m.is_modified());
        assert!(m.undo_enabled());
        assert!(!m.can_undo());
        assert_eq!(m.status().bits, 24);
    }

    #[test]
    fn test_nested_transactions_commit_once() {
        let m = manager(1, 100);
        {
            let _outer = m.transaction("Outer");
            assert_eq!(m.transaction_level(), 1);
            {
                let _inner = m.transaction("Inner");
                assert_eq!(m.transaction_level(), 2);
                m.insert_samples(0, 0, &[1, 2, 3]).unwrap();
            }
            m.delete_range(0, 1, &[0]).unwrap();
        }
        assert_eq!(m.transaction_level(), 0);
        assert_eq!(m.undo_count(), 1);
        assert_eq!(m.undo_description().as_deref(), Some("Outer"));
        assert!(m.undo().unwrap());
        assert_eq!(m.length(), 100);
    }

    #[test]
    fn test_aborted_transaction_rolls_back() {
        let m = manager(2, 100);
        let before = m.signal().read_samples(0, 0, 100).unwrap();
        {
            let guard = m.transaction("Broken");
            m.insert_samples(0, 10, &ramp(50)).unwrap();
            m.delete_track(1).unwrap();
            guard.abort();
        }
        assert_eq!(m.track_count(), 2);
        assert_eq!(m.signal().read_samples(0, 0, 100).unwrap(), before);
        assert_eq!(m.undo_count(), 0);
        assert!(!m.is_modified());
    }

    #[test]
    fn test_failing_operation_changes_nothing() {
        let m = manager(2, 100);
        let err = m.delete_range(50, 100, &[0, 1]).unwrap_err();
        assert!(err.is_range());
        assert!(m.delete_range(0, 10, &[0, 5]).is_err());
        assert_eq!(m.length(), 100);
        assert_eq!(m.undo_count(), 0);
    }

    #[test]
    fn test_selection_only_transaction_discarded_when_unchanged() {
        let m = manager(1, 100);
        drop(m.transaction("Nothing"));
        assert_eq!(m.undo_count(), 0);

        {
            let _tx = m.transaction("Select");
            m.select_range(10, 20);
        }
        assert_eq!(m.undo_count(), 1);
        assert!(!m.is_modified());
        assert!(m.undo().unwrap());
        assert_eq!(m.selection(), Selection::new(0, 0));
        // a single selection action is not worth a redo
        assert!(!m.can_redo());
    }

    #[test]
    fn test_new_transaction_drops_redo() {
        let m = manager(1, 100);
        m.insert_space(0, 10, &[0]).unwrap();
        m.undo().unwrap();
        assert!(m.can_redo());
        m.delete_range(0, 5, &[0]).unwrap();
        assert!(!m.can_redo());
        assert!(!m.redo().unwrap());
    }

    #[test]
    fn test_undo_and_redo_track_delete() {
        let m = manager(3, 10);
        m.overwrite_samples(1, 0, &ramp(10)).unwrap();
        let id = m.signal().track(1).unwrap().id();
        m.delete_track(1).unwrap();
        assert_eq!(m.track_count(), 2);

        m.undo().unwrap();
        assert_eq!(m.signal().index_of(id), Some(1));
        assert_eq!(m.signal().read_samples(1, 0, 10).unwrap(), ramp(10));

        m.redo().unwrap();
        assert_eq!(m.track_count(), 2);
        assert!(m.signal().index_of(id).is_none());
    }

    #[test]
    fn test_insert_track_mid_list() {
        let m = manager(2, 50);
        let first = m.signal().track(0).unwrap().id();
        let second = m.signal().track(1).unwrap().id();
        assert_eq!(m.insert_track(1).unwrap(), 1);
        assert_eq!(m.signal().index_of(first), Some(0));
        assert_eq!(m.signal().index_of(second), Some(2));
        assert_eq!(m.signal().track(1).unwrap().length(), 50);
        m.undo().unwrap();
        assert_eq!(m.track_count(), 2);
        assert_eq!(m.signal().index_of(second), Some(1));
    }

    #[test]
    fn test_file_info_undo() {
        let m = manager(1, 10);
        let mut info = m.file_info();
        info.rate = 96000.0;
        m.set_file_info(info).unwrap();
        assert_eq!(m.status().rate, 96000.0);
        assert!(m.is_modified());
        m.undo().unwrap();
        assert_eq!(m.status().rate, 48000.0);
        assert!(!m.is_modified());
        m.redo().unwrap();
        assert_eq!(m.status().rate, 96000.0);
    }

    #[test]
    fn test_overwrite_writer_pads_and_undoes() {
        let m = manager(1, 10);
        {
            let _tx = m.transaction("Record");
            let mut writer = m.open_writer(InsertMode::Overwrite, 0, 5, 19).unwrap();
            writer.write(&ramp(15)).unwrap();
        }
        assert_eq!(m.length(), 20);
        assert_eq!(m.signal().read_samples(0, 5, 15).unwrap(), ramp(15));
        m.undo().unwrap();
        assert_eq!(m.length(), 10);
        assert_eq!(m.signal().read_samples(0, 0, 10).unwrap(), vec![0; 10]);
    }

    #[test]
    fn test_writer_needs_transaction_while_recording() {
        let m = manager(1, 100);
        let err = m.open_writer(InsertMode::Append, 0, 0, 0).unwrap_err();
        assert!(matches!(err, SfError::State(_)));
        assert_eq!(m.length(), 100);
        assert!(!m.is_modified());

        // without undo there is nothing to record, the edit latches instead
        m.disable_undo();
        {
            let mut writer = m.open_writer(InsertMode::Append, 0, 0, 0).unwrap();
            writer.write(&[1; 50]).unwrap();
        }
        assert_eq!(m.length(), 150);
        m.enable_undo();
        m.delete_range(0, 10, &[0]).unwrap();
        m.undo().unwrap();
        assert_eq!(m.length(), 150);
        assert!(m.is_modified());
    }

    #[test]
    fn test_live_writer_holds_its_range_until_dropped() {
        let m = manager(1, 100);
        let _tx = m.transaction("Overwrite");
        let track = m.signal().track(0).unwrap();
        let writer = m.open_writer(InsertMode::Overwrite, 0, 5, 19).unwrap();
        let edit = SampleRange::new(10, 5);
        assert!(track.range_locks().try_lock(sf_signal::LockMode::Exclusive, edit).is_none());
        drop(writer);
        assert!(track.range_locks().try_lock(sf_signal::LockMode::Exclusive, edit).is_some());
    }

    #[test]
    fn test_insert_writer_length_follows_written() {
        let m = manager(1, 10);
        {
            let _tx = m.transaction("Insert");
            let mut writer = m.open_writer(InsertMode::Insert, 0, 3, 0).unwrap();
            writer.write(&[7; 25]).unwrap();
        }
        assert_eq!(m.length(), 35);
        m.undo().unwrap();
        assert_eq!(m.length(), 10);
        m.redo().unwrap();
        assert_eq!(m.signal().read_samples(0, 3, 25).unwrap(), vec![7; 25]);
    }

    #[test]
    fn test_budget_decline_aborts() {
        let m = SignalManager::new().with_policy(Arc::new(StrictPolicy));
        m.new_signal(10_000, 48000.0, 24, 1).unwrap();
        m.set_undo_memory_budget(4096);
        let err = m.delete_range(0, 5000, &[0]).unwrap_err();
        assert!(matches!(err, SfError::Aborted));
        assert_eq!(m.length(), 10_000);
        assert!(!m.is_modified());
    }

    #[test]
    #[should_panic(expected = "inside an undo transaction")]
    fn test_disable_undo_inside_transaction_panics() {
        let m = manager(1, 10);
        let _tx = m.transaction("Open");
        m.disable_undo();
    }

    #[test]
    fn test_undo_disabled_records_nothing() {
        let m = manager(1, 100);
        m.disable_undo();
        m.delete_range(0, 10, &[0]).unwrap();
        assert!(!m.undo().unwrap());
        assert!(m.is_modified());
        m.enable_undo();
        m.delete_range(0, 10, &[0]).unwrap();
        m.undo().unwrap();
        // the unrecorded delete is still there
        assert!(m.is_modified());
    }
}
