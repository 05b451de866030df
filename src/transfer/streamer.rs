//! Range streaming
//!
//! Serves one bounded chunk of a stored file per request. Nothing is
//! remembered between requests; the client advances `start` itself.

use std::sync::Arc;

use crate::storage::{ByteStore, ByteStream};

use super::error::TransferError;
use super::range::{RangeRequest, ServiceableRange};

/// One chunk ready to be framed as partial content
pub struct RangeChunk {
    pub range: ServiceableRange,

    /// Exactly `range.chunk_len()` bytes
    pub body: ByteStream,
}

/// Resolves range requests against the store
#[derive(Clone)]
pub struct RangeStreamer {
    store: Arc<dyn ByteStore>,
    chunk_ceiling: u64,
}

impl RangeStreamer {
    pub fn new(store: Arc<dyn ByteStore>, chunk_ceiling: u64) -> Self {
        Self {
            store,
            chunk_ceiling: chunk_ceiling.max(1),
        }
    }

    /// Open the serviceable part of `range_header` for `name`
    pub async fn stream(
        &self,
        name: &str,
        range_header: Option<&str>,
    ) -> Result<RangeChunk, TransferError> {
        let request = RangeRequest::parse(range_header.ok_or(TransferError::MissingRange)?)?;

        // Size and body must come from the same committed version
        let object = self.store.open(name).await?;
        let range = ServiceableRange::resolve(request, object.size(), self.chunk_ceiling)?;
        let body = object.read_range(range.start, range.end)?;

        tracing::debug!(
            name = %name,
            start = range.start,
            end = range.end,
            total = range.total,
            "Serving range"
        );

        Ok(RangeChunk { range, body })
    }
}
