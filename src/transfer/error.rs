//! Transfer error kinds

use crate::storage::StorageError;

/// Failures of the resumable-transfer core.
///
/// Store failures are carried over unchanged in meaning; `IoFailure` is the
/// only kind that indicates a server-side fault.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("Missing filename")]
    MissingFilename,

    #[error("Missing Range header")]
    MissingRange,

    #[error("Malformed Range header: {0}")]
    MalformedRange(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File is empty")]
    EmptyFile,

    #[error("Range not satisfiable: start {start} is beyond size {size}")]
    RangeNotSatisfiable { start: u64, size: u64 },

    #[error("File too large (max: {max} bytes)")]
    FileTooLarge { max: u64 },

    #[error("Offset mismatch: expected {expected}, stored {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("Storage failure: {0}")]
    IoFailure(StorageError),
}

impl From<StorageError> for TransferError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => Self::NotFound(name),
            StorageError::RangeOutOfBounds { start, size, .. } => {
                Self::RangeNotSatisfiable { start, size }
            }
            StorageError::InvalidName(reason) => Self::InvalidName(reason),
            StorageError::TooLarge { max } => Self::FileTooLarge { max },
            StorageError::OffsetMismatch { expected, actual } => {
                Self::OffsetMismatch { expected, actual }
            }
            StorageError::Upload(reason) => Self::MalformedUpload(reason),
            err @ (StorageError::Io(_) | StorageError::Index(_)) => Self::IoFailure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_keep_their_kind() {
        let err = TransferError::from(StorageError::NotFound("a.mp4".to_string()));
        assert!(matches!(err, TransferError::NotFound(name) if name == "a.mp4"));

        let err = TransferError::from(StorageError::RangeOutOfBounds {
            start: 10,
            end: 19,
            size: 10,
        });
        assert!(matches!(
            err,
            TransferError::RangeNotSatisfiable { start: 10, size: 10 }
        ));

        let err = TransferError::from(StorageError::Io(std::io::Error::other("disk full")));
        assert!(matches!(err, TransferError::IoFailure(StorageError::Io(_))));

        let err = TransferError::from(StorageError::Upload("reset".to_string()));
        assert!(matches!(err, TransferError::MalformedUpload(reason) if reason == "reset"));
    }
}
