//! Upload status route
//!
//! GET /upload-status?filename=<name> - bytes stored so far

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::state::AppState;
use crate::transfer::{TransferError, UploadStatus};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(upload_status))
}

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

impl FilenameQuery {
    /// The requested name, rejecting a missing or blank parameter
    pub fn require(&self) -> Result<&str> {
        match self.filename.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(TransferError::MissingFilename),
        }
    }
}

/// GET /upload-status
async fn upload_status(
    State(state): State<AppState>,
    Query(query): Query<FilenameQuery>,
) -> Result<Json<UploadStatus>> {
    let name = query.require()?;
    let status = state.status().status(name).await?;
    Ok(Json(status))
}
