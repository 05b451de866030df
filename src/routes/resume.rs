//! Range retrieval route
//!
//! GET /upload-resume?filename=<name> with `Range: bytes=<start>-` returns
//! 206 Partial Content holding at most one chunk-ceiling of bytes.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::TryStreamExt;

use crate::error::Result;
use crate::state::AppState;
use crate::transfer::{TransferError, RANGE_CONTENT_TYPE};

use super::status::FilenameQuery;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(fetch_range))
}

/// GET /upload-resume
async fn fetch_range(
    State(state): State<AppState>,
    Query(query): Query<FilenameQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let name = query.require()?;

    let range_header = headers
        .get(header::RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| TransferError::MalformedRange("non-ASCII header value".to_string()))
        })
        .transpose()?;

    let chunk = state.streamer().stream(name, range_header).await?;
    let range = chunk.range;

    let log_name = name.to_string();
    let body = chunk.body.inspect_err(move |e| {
        tracing::error!(name = %log_name, error = %e, "Range stream failed");
    });

    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_RANGE, range.content_range()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CONTENT_LENGTH, range.chunk_len().to_string()),
            (header::CONTENT_TYPE, RANGE_CONTENT_TYPE.to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
