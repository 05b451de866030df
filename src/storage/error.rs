//! Storage error types

use thiserror::Error;

/// Result type for byte store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Byte store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Range out of bounds: start {start}, end {end}, size {size}")]
    RangeOutOfBounds { start: u64, end: u64, size: u64 },

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File too large (max: {max} bytes)")]
    TooLarge { max: u64 },

    #[error("Offset mismatch: expected {expected}, stored {actual}")]
    OffsetMismatch { expected: u64, actual: u64 },

    #[error("Upload stream failed: {0}")]
    Upload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index error: {0}")]
    Index(#[from] serde_json::Error),
}

impl StorageError {
    /// Map an IO error to `NotFound` when the underlying file is missing
    pub(crate) fn from_io(name: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::Io(err)
        }
    }
}
