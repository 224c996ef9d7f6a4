//! Change notifications emitted by a signal
//!
//! Events are delivered only after the underlying mutation has fully
//! committed, always tagged with the index the track had at that moment.

use sf_core::{SampleRange, TrackId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    TrackInserted { index: usize, id: TrackId },
    TrackDeleted { index: usize, id: TrackId },
    SamplesInserted { track: usize, range: SampleRange },
    SamplesDeleted { track: usize, range: SampleRange },
    SamplesModified { track: usize, range: SampleRange },
    TrackSelectionChanged { track: usize, selected: bool },
}

impl SignalEvent {
    /// True for events that change sample content or the track set
    pub fn is_modification(&self) -> bool {
        !matches!(self, SignalEvent::TrackSelectionChanged { .. })
    }
}

/// Receiver of signal events, one per signal
pub trait SignalEventSink: Send + Sync {
    fn signal_event(&self, event: &SignalEvent);
}

impl<F> SignalEventSink for F
where
    F: Fn(&SignalEvent) + Send + Sync,
{
    fn signal_event(&self, event: &SignalEvent) {
        self(event)
    }
}
