//! HTTP error mapping
//!
//! The only place transfer failures become status codes. Bodies are plain
//! text; server-side failures are logged and not echoed to the client.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::transfer::TransferError;

/// Result type for route handlers
pub type Result<T> = std::result::Result<T, TransferError>;

impl TransferError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoFileUploaded
            | Self::MissingFilename
            | Self::MissingRange
            | Self::MalformedRange(_)
            | Self::MalformedUpload(_)
            | Self::InvalidName(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OffsetMismatch { .. } => StatusCode::CONFLICT,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::EmptyFile | Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::IoFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Size of the file a range could not be served from
    fn unsatisfied_size(&self) -> Option<u64> {
        match self {
            Self::EmptyFile => Some(0),
            Self::RangeNotSatisfiable { size, .. } => Some(*size),
            _ => None,
        }
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::NotFound(name) => {
                tracing::debug!(name = %name, "File not found");
                "File not found".to_string()
            }
            Self::IoFailure(e) => {
                tracing::error!(error = %e, "Storage failure");
                "Internal server error".to_string()
            }
            other => {
                tracing::debug!(error = %other, status = %status, "Rejected request");
                other.to_string()
            }
        };

        match self.unsatisfied_size() {
            Some(size) => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                message,
            )
                .into_response(),
            None => (status, message).into_response(),
        }
    }
}
