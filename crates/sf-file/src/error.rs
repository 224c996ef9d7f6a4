//! File I/O error types

use sf_core::SfError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Open error: {0}")]
    Open(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Signal(#[from] SfError),

    #[error("Transfer cancelled")]
    Cancelled,
}

pub type FileResult<T> = Result<T, FileError>;

impl From<FileError> for SfError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Cancelled => SfError::Cancelled,
            FileError::Signal(SfError::Cancelled) => SfError::Cancelled,
            other => SfError::Collaborator(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_core_error() {
        let err: SfError = FileError::Decode("bad header".into()).into();
        assert!(matches!(err, SfError::Collaborator(ref m) if m == "Decode error: bad header"));
        let err: SfError = FileError::Cancelled.into();
        assert!(matches!(err, SfError::Cancelled));
        let err: SfError = FileError::Signal(SfError::Cancelled).into();
        assert!(matches!(err, SfError::Cancelled));
    }
}
