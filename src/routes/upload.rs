//! Upload Routes
//!
//! - POST /upload - store the `video` field of a multipart form under the
//!   client-supplied file name, replacing earlier content
//! - POST /upload?offset=N - append to the stored content, which must be
//!   exactly N bytes long

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    routing::post,
    Json, Router,
};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;
use crate::storage::{BoxError, UploadStream};
use crate::transfer::{FileMetadata, TransferError, UploadAck, UPLOAD_FIELD};

/// Create the upload router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload_video))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Resume offset; absent for a full replace
    pub offset: Option<u64>,
}

/// POST /upload
async fn upload_video(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadAck>> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Request is not a multipart upload");
        TransferError::NoFileUploaded
    })?;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to read multipart field");
        TransferError::MalformedUpload(e.to_string())
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            tracing::debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        // A plain form value under the file field is not a file
        let Some(original_name) = field.file_name().map(str::to_string) else {
            return Err(TransferError::NoFileUploaded);
        };
        let mime_type = field.content_type().map(str::to_string);

        let data: UploadStream<'_> = Box::pin(field.map_err(|e| Box::new(e) as BoxError));
        let stored = match query.offset {
            Some(offset) => state.store().append(&original_name, offset, data).await?,
            None => state.store().write(&original_name, data).await?,
        };

        tracing::info!(
            name = %stored.name,
            key = %stored.key,
            size = stored.size,
            offset = ?query.offset,
            "Upload stored"
        );

        return Ok(Json(UploadAck::new(FileMetadata::from_stored(
            stored,
            UPLOAD_FIELD,
            mime_type,
        ))));
    }

    tracing::warn!("No video field found in multipart upload");
    Err(TransferError::NoFileUploaded)
}
