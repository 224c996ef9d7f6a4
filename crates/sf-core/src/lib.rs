//! sf-core: Shared types for SampleForge
//!
//! Sample representation, the error taxonomy used by every other crate,
//! stable track identities and half-open sample ranges.

mod error;
mod range;
mod sample;
mod track;

pub use error::*;
pub use range::*;
pub use sample::*;
pub use track::*;
