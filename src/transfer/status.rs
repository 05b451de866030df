//! Upload status queries
//!
//! Lets a resuming client find out how many bytes were already accepted.
//! Only committed content counts; in-flight writes are invisible.

use std::sync::Arc;

use crate::storage::ByteStore;

use super::error::TransferError;
use super::types::UploadStatus;

/// Reports durably stored byte counts
#[derive(Clone)]
pub struct UploadStatusResolver {
    store: Arc<dyn ByteStore>,
}

impl UploadStatusResolver {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self { store }
    }

    /// Bytes stored under `name`
    pub async fn status(&self, name: &str) -> Result<UploadStatus, TransferError> {
        if !self.store.exists(name).await? {
            return Err(TransferError::NotFound(name.to_string()));
        }

        let uploaded = self.store.size(name).await?;
        Ok(UploadStatus { uploaded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::upload;
    use crate::storage::MemoryByteStore;

    #[tokio::test]
    async fn test_status_reports_stored_size() {
        let store = Arc::new(MemoryByteStore::new(1024));
        let resolver = UploadStatusResolver::new(store.clone());

        store.write("clip.mp4", upload(&[7u8; 300], 64)).await.unwrap();

        let status = resolver.status("clip.mp4").await.unwrap();
        assert_eq!(status, UploadStatus { uploaded: 300 });

        // Same content again leaves the count unchanged
        store.write("clip.mp4", upload(&[7u8; 300], 64)).await.unwrap();
        assert_eq!(resolver.status("clip.mp4").await.unwrap().uploaded, 300);
    }

    #[tokio::test]
    async fn test_status_of_missing_file() {
        let resolver = UploadStatusResolver::new(Arc::new(MemoryByteStore::new(1024)));

        let result = resolver.status("missing.mp4").await;
        assert!(matches!(result, Err(TransferError::NotFound(name)) if name == "missing.mp4"));
    }

    #[tokio::test]
    async fn test_status_of_empty_file() {
        let store = Arc::new(MemoryByteStore::new(1024));
        let resolver = UploadStatusResolver::new(store.clone());

        store.write("empty.mp4", upload(b"", 1)).await.unwrap();
        assert_eq!(resolver.status("empty.mp4").await.unwrap().uploaded, 0);
    }
}
