//! sf-state: Document state, undo/redo and editing commands
//!
//! The [`SignalManager`] owns one open document and runs every edit inside
//! an undo transaction. History is size-bounded by the undo memory budget
//! from [`EditorPreferences`].

mod clipboard;
mod commands;
mod events;
mod manager;
mod policy;
mod preferences;
mod selection;
mod undo;

pub use clipboard::*;
pub use commands::*;
pub use events::{DocumentEvent, DocumentListener, DocumentStatus};
pub use manager::*;
pub use policy::*;
pub use preferences::*;
pub use selection::*;
pub use undo::*;
