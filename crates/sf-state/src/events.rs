//! Document change notifications

use std::sync::Arc;

use parking_lot::Mutex;
use sf_signal::SignalEvent;

use crate::Selection;

/// Aggregate numbers a status bar shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentStatus {
    pub length: u64,
    pub tracks: usize,
    pub rate: f64,
    pub bits: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// Track or sample change, forwarded from the signal
    Signal(SignalEvent),
    SelectionChanged(Selection),
    /// New undo / redo descriptions, `None` when nothing is available
    UndoRedoChanged {
        undo: Option<String>,
        redo: Option<String>,
    },
    ModifiedChanged(bool),
    Status(DocumentStatus),
}

pub trait DocumentListener: Send + Sync {
    fn document_event(&self, event: &DocumentEvent);
}

impl<F> DocumentListener for F
where
    F: Fn(&DocumentEvent) + Send + Sync,
{
    fn document_event(&self, event: &DocumentEvent) {
        self(event)
    }
}

/// Registered listeners, notified in registration order
#[derive(Default)]
pub(crate) struct Listeners {
    list: Mutex<Vec<Arc<dyn DocumentListener>>>,
}

impl Listeners {
    pub fn add(&self, listener: Arc<dyn DocumentListener>) {
        self.list.lock().push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn DocumentListener>) {
        self.list.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.list.lock().len()
    }

    pub fn notify(&self, event: &DocumentEvent) {
        // listeners may register others from inside the callback
        let list = self.list.lock().clone();
        for listener in list {
            listener.document_event(event);
        }
    }
}
