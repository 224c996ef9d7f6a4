//! sf-signal: Multi-track sample storage
//!
//! A [`Signal`] is an ordered list of [`Track`]s. Each track stores its
//! samples in a gap-free sequence of [`Stripe`]s and exposes a single
//! `[0, length)` address space. Streaming access goes through
//! [`SampleReader`] and [`SampleWriter`], which hold a range lock on the
//! track for their whole lifetime.

mod event;
mod range_lock;
mod reader;
mod signal;
mod stripe;
mod track;
mod writer;

pub use event::*;
pub use range_lock::*;
pub use reader::*;
pub use signal::*;
pub use stripe::*;
pub use track::*;
pub use writer::*;
