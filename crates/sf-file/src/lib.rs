//! sf-file: File I/O collaborator interfaces
//!
//! SampleForge does not implement any file format itself. Codecs plug in
//! through [`Decoder`] and [`Encoder`], which stream samples through
//! per-track writers and readers:
//! - [`FileInfo`] carries rate, bit depth, length and free-form properties
//! - [`MultiTrackWriter`] / [`MultiTrackReader`] bundle one stream per track
//! - [`TransferProgress`] reports bytes processed and carries the cancel flag

mod codec;
mod error;
mod file_info;
mod multi_track;
mod progress;

pub use codec::*;
pub use error::*;
pub use file_info::*;
pub use multi_track::*;
pub use progress::*;
