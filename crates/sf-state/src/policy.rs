//! Answers to the questions the editor would otherwise ask the user

use sf_file::FileProperty;

/// Decisions for situations that need user confirmation
pub trait UserPolicy: Send + Sync {
    /// Undo memory ran out: keep going without undo for this operation?
    ///
    /// Declining aborts the running operation and rolls it back.
    fn confirm_continue_without_undo(&self) -> bool;

    /// The chosen encoder cannot store `lost`; save anyway?
    fn confirm_lossy_save(&self, lost: &[FileProperty]) -> bool;
}

/// Accept both prompts
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl UserPolicy for DefaultPolicy {
    fn confirm_continue_without_undo(&self) -> bool {
        true
    }

    fn confirm_lossy_save(&self, _lost: &[FileProperty]) -> bool {
        true
    }
}

/// Decline both prompts
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictPolicy;

impl UserPolicy for StrictPolicy {
    fn confirm_continue_without_undo(&self) -> bool {
        false
    }

    fn confirm_lossy_save(&self, _lost: &[FileProperty]) -> bool {
        false
    }
}
