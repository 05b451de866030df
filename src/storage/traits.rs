//! Byte store trait definitions

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;

use super::error::{StorageError, StorageResult};

/// Boxed error produced by an incoming upload body
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Incoming bytes for a write. May borrow from the request being decoded.
pub type UploadStream<'a> = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + 'a>>;

/// Lazy, single-pass sequence of stored bytes.
///
/// Dropping the stream releases the underlying read handle.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Metadata for a durably stored file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    /// Client-supplied name
    pub name: String,

    /// Internal storage key (never derived from the name)
    pub key: String,

    /// Durable size in bytes
    pub size: u64,

    /// When this content was committed
    pub stored_at: DateTime<Utc>,
}

/// Content of one name as it was when opened.
///
/// Size and bytes come from the same committed version; a later replace of
/// the name does not change what this handle reports or reads.
pub trait OpenedObject: Send {
    /// Byte length of the opened content
    fn size(&self) -> u64;

    /// Stream the inclusive byte range `start..=end` of the opened content.
    ///
    /// Fails with `RangeOutOfBounds` unless `start <= end < size`.
    fn read_range(self: Box<Self>, start: u64, end: u64) -> StorageResult<ByteStream>;
}

/// Reject ranges that do not fit inside `size` bytes
pub(crate) fn check_range(start: u64, end: u64, size: u64) -> StorageResult<()> {
    if start > end || end >= size {
        return Err(StorageError::RangeOutOfBounds { start, end, size });
    }
    Ok(())
}

/// Durable, name-keyed store of byte sequences.
///
/// Writes are atomic from a reader's point of view: `size` and `open`
/// observe either the previous content or the new one, never a partial write.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Whether content has been committed under `name`
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Durable byte length of `name`
    async fn size(&self, name: &str) -> StorageResult<u64>;

    /// Replace the content of `name` with everything `data` yields
    async fn write<'a>(&self, name: &str, data: UploadStream<'a>) -> StorageResult<StoredObject>;

    /// Append `data` to `name`, provided its current size equals `offset`.
    ///
    /// A missing name counts as size 0.
    async fn append<'a>(
        &self,
        name: &str,
        offset: u64,
        data: UploadStream<'a>,
    ) -> StorageResult<StoredObject>;

    /// Pin the current content of `name` for reading
    async fn open(&self, name: &str) -> StorageResult<Box<dyn OpenedObject>>;

    /// Read the inclusive byte range `start..=end` of `name`.
    ///
    /// Fails with `RangeOutOfBounds` unless `start <= end < size`.
    async fn read_range(&self, name: &str, start: u64, end: u64) -> StorageResult<ByteStream> {
        self.open(name).await?.read_range(start, end)
    }
}
