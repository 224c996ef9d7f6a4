//! Undo / redo machinery

mod action;
mod history;
mod transaction;

pub use action::*;
pub use history::*;
pub use transaction::*;

pub(crate) use action::clip_length;
