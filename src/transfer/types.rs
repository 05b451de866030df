//! Wire types for the transfer endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StoredObject;

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "video";

/// Content type of every range response
pub const RANGE_CONTENT_TYPE: &str = "video/mp4";

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Upload successful";

/// Bytes durably stored under a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub uploaded: u64,
}

/// Response to a successful ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAck {
    pub message: String,
    pub file: FileMetadata,
}

impl UploadAck {
    pub fn new(file: FileMetadata) -> Self {
        Self {
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            file,
        }
    }
}

/// Metadata of the stored upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Multipart field the file arrived in
    pub field_name: String,

    /// Name the client supplied; the key for status and range queries
    pub original_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Internal storage key
    pub storage_key: String,

    /// Final stored size in bytes
    pub size: u64,

    pub stored_at: DateTime<Utc>,
}

impl FileMetadata {
    pub fn from_stored(stored: StoredObject, field_name: &str, mime_type: Option<String>) -> Self {
        Self {
            field_name: field_name.to_string(),
            original_name: stored.name,
            mime_type,
            storage_key: stored.key,
            size: stored.size,
            stored_at: stored.stored_at,
        }
    }
}
