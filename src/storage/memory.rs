//! In-memory byte store
//!
//! Same contract as the filesystem store, without durability. Content is
//! buffered until the upload stream ends, then swapped in whole.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use super::index::validate_name;
use super::traits::{check_range, ByteStore, ByteStream, OpenedObject, StoredObject, UploadStream};

/// Largest slice handed out per stream item
const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
struct MemoryObject {
    key: Uuid,
    data: Bytes,
    stored_at: DateTime<Utc>,
}

/// Volatile byte store
pub struct MemoryByteStore {
    objects: RwLock<HashMap<String, MemoryObject>>,
    max_object_size: u64,
}

impl MemoryByteStore {
    pub fn new(max_object_size: u64) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            max_object_size,
        }
    }

    async fn collect(&self, prefix: Bytes, mut data: UploadStream<'_>) -> StorageResult<Bytes> {
        let mut buf = BytesMut::from(&prefix[..]);
        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(|e| StorageError::Upload(e.to_string()))?;
            if (buf.len() + chunk.len()) as u64 > self.max_object_size {
                return Err(StorageError::TooLarge {
                    max: self.max_object_size,
                });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Make `data` the content of `name`.
    ///
    /// With `expected`, the commit only happens if `name` still holds the
    /// version (by key) the caller checked its offset against.
    async fn commit(
        &self,
        name: &str,
        data: Bytes,
        expected: Option<(Option<Uuid>, u64)>,
    ) -> StorageResult<StoredObject> {
        let object = MemoryObject {
            key: Uuid::new_v4(),
            data,
            stored_at: Utc::now(),
        };
        let stored = StoredObject {
            name: name.to_string(),
            key: object.key.to_string(),
            size: object.data.len() as u64,
            stored_at: object.stored_at,
        };

        let mut objects = self.objects.write().await;
        if let Some((key, offset)) = expected {
            let current = objects.get(name);
            if current.map(|object| object.key) != key {
                return Err(StorageError::OffsetMismatch {
                    expected: offset,
                    actual: current.map_or(0, |object| object.data.len() as u64),
                });
            }
        }
        objects.insert(name.to_string(), object);
        Ok(stored)
    }
}

#[async_trait]
impl ByteStore for MemoryByteStore {
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(name))
    }

    async fn size(&self, name: &str) -> StorageResult<u64> {
        self.objects
            .read()
            .await
            .get(name)
            .map(|object| object.data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn write<'a>(&self, name: &str, data: UploadStream<'a>) -> StorageResult<StoredObject> {
        validate_name(name)?;
        let data = self.collect(Bytes::new(), data).await?;
        self.commit(name, data, None).await
    }

    async fn append<'a>(
        &self,
        name: &str,
        offset: u64,
        data: UploadStream<'a>,
    ) -> StorageResult<StoredObject> {
        validate_name(name)?;
        let (key, current) = self
            .objects
            .read()
            .await
            .get(name)
            .map(|object| (Some(object.key), object.data.clone()))
            .unwrap_or_default();

        if current.len() as u64 != offset {
            return Err(StorageError::OffsetMismatch {
                expected: offset,
                actual: current.len() as u64,
            });
        }

        let data = self.collect(current, data).await?;
        self.commit(name, data, Some((key, offset))).await
    }

    async fn open(&self, name: &str) -> StorageResult<Box<dyn OpenedObject>> {
        let data = self
            .objects
            .read()
            .await
            .get(name)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        Ok(Box::new(MemorySnapshot { data }))
    }
}

struct MemorySnapshot {
    data: Bytes,
}

impl OpenedObject for MemorySnapshot {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(self: Box<Self>, start: u64, end: u64) -> StorageResult<ByteStream> {
        check_range(start, end, self.size())?;

        let range = self.data.slice(start as usize..=end as usize);
        let chunks: Vec<StorageResult<Bytes>> = (0..range.len())
            .step_by(READ_CHUNK_SIZE)
            .map(|offset| Ok(range.slice(offset..(offset + READ_CHUNK_SIZE).min(range.len()))))
            .collect();

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
