//! Decoder / Encoder collaborator traits
//!
//! The editor core never interprets a byte format. A load hands a decoder
//! one empty track per channel through a [`MultiTrackWriter`]; a save hands
//! an encoder one reader per track through a [`MultiTrackReader`].

use std::io::{Read, Write};

use crate::{FileInfo, FileProperty, FileResult, MultiTrackReader, MultiTrackWriter, TransferProgress};

/// Format reader plugged into a document load
pub trait Decoder: Send {
    /// Short format name for logging
    fn name(&self) -> &str;

    /// Inspect `source` and report what it contains
    ///
    /// `tracks` and `length` of the returned info decide how many tracks
    /// the document gets; `length` may be zero if unknown in advance.
    fn open(&mut self, source: Box<dyn Read + Send>) -> FileResult<FileInfo>;

    /// Stream every sample into `dst`, one writer per track
    ///
    /// Implementations check `progress.is_cancelled()` between blocks and
    /// return [`crate::FileError::Cancelled`] when it is set.
    fn decode(&mut self, dst: &mut MultiTrackWriter, progress: &TransferProgress) -> FileResult<()>;

    /// Release the source
    fn close(&mut self) {}
}

/// Format writer plugged into a document save
pub trait Encoder: Send {
    fn name(&self) -> &str;

    /// Properties this format can store
    ///
    /// Anything else set on the document is lost on save.
    fn supported_properties(&self) -> Vec<FileProperty>;

    fn encode(
        &mut self,
        src: &mut MultiTrackReader,
        dst: &mut dyn Write,
        info: &FileInfo,
        progress: &TransferProgress,
    ) -> FileResult<()>;
}
