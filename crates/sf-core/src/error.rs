//! Error types for SampleForge

use std::collections::TryReserveError;

use thiserror::Error;

/// Core error type
///
/// Programming-contract violations (closing a transaction that was never
/// opened, disabling undo mid-transaction) are not represented here: they
/// panic.
#[derive(Error, Debug)]
pub enum SfError {
    /// Samples or tracks addressed outside of their valid bounds
    #[error("Range error: {0}")]
    Range(String),

    /// Out of memory or undo memory budget exhausted
    #[error("Resource error: {0}")]
    Resource(String),

    /// A decoder or encoder failed
    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Operation stopped through its cancel flag
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation declined by the user, nothing was changed
    #[error("Operation aborted")]
    Aborted,

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type SfResult<T> = Result<T, SfError>;

impl SfError {
    pub fn range(what: impl Into<String>) -> Self {
        SfError::Range(what.into())
    }

    pub fn is_range(&self) -> bool {
        matches!(self, SfError::Range(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, SfError::Resource(_))
    }
}

impl From<TryReserveError> for SfError {
    fn from(err: TryReserveError) -> Self {
        SfError::Resource(err.to_string())
    }
}

/// Allocate a zero filled sample buffer without aborting on OOM
pub fn try_alloc_samples(len: usize) -> SfResult<Vec<crate::Sample>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, 0);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SfError::range("offset 10 > length 5");
        assert_eq!(err.to_string(), "Range error: offset 10 > length 5");
        assert!(err.is_range());
        assert!(!err.is_resource());
    }

    #[test]
    fn test_try_reserve_maps_to_resource() {
        let mut v: Vec<u8> = Vec::new();
        let err: SfError = v.try_reserve(usize::MAX).unwrap_err().into();
        assert!(err.is_resource());
    }

    #[test]
    fn test_try_alloc_samples_zeroed() {
        let buf = try_alloc_samples(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&s| s == 0));
    }
}
