//! Local Filesystem Byte Store
//!
//! Layout of the upload directory (flat):
//!
//! - `index.json` - name -> blob mapping (see [`NameIndex`])
//! - `<uuid>.blob` - committed content, one per name
//! - `.<uuid>.part` - in-flight writes, removed on failure and swept at startup
//!
//! A write streams into a part file, fsyncs it, renames it to a fresh blob and
//! then swaps the index entry. Readers resolve and open blobs under the index
//! read lock, so they see either the old blob or the new one in full.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::instrument;
use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use super::index::{
    blob_path, part_path, validate_name, IndexEntry, NameIndex, BLOB_EXTENSION, PART_EXTENSION,
};
use super::traits::{check_range, ByteStore, ByteStream, OpenedObject, StoredObject, UploadStream};

/// Read buffer size for range streams (64 KiB)
const READ_CHUNK_SIZE: usize = 64 * 1024;

type NameLockTable = parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>;

// ============================================================================
// Local Byte Store
// ============================================================================

/// Filesystem-backed byte store
pub struct LocalByteStore {
    root: PathBuf,

    /// Largest object a write may produce
    max_object_size: u64,

    /// Name -> blob mapping
    index: RwLock<NameIndex>,

    /// Serializes writers of the same name
    write_locks: NameLockTable,
}

impl LocalByteStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Leftover part files and unreferenced blobs from an earlier run are removed.
    pub async fn open(root: impl AsRef<Path>, max_object_size: u64) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let index = NameIndex::load(&root).await?;
        let swept = sweep(&root, &index).await?;

        tracing::info!(
            root = %root.display(),
            files = index.len(),
            swept = swept,
            "Opened local byte store"
        );

        Ok(Self {
            root,
            max_object_size,
            index: RwLock::new(index),
            write_locks: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Wait for exclusive write access to `name`
    async fn lock_name(&self, name: &str) -> NameLock<'_> {
        let lock = {
            let mut table = self.write_locks.lock();
            table.entry(name.to_string()).or_default().clone()
        };

        let mut handle = NameLock {
            table: &self.write_locks,
            name: name.to_string(),
            lock,
            guard: None,
        };
        handle.guard = Some(handle.lock.clone().lock_owned().await);
        handle
    }

    /// Stream `data` into a new blob and make it the content of `name`.
    ///
    /// With `append_at`, the current content is copied first; it must be exactly
    /// that many bytes long. Caller holds the name lock.
    async fn write_locked(
        &self,
        name: &str,
        append_at: Option<u64>,
        mut data: UploadStream<'_>,
    ) -> StorageResult<StoredObject> {
        let id = Uuid::new_v4();
        let part = PartFile::new(part_path(&self.root, &id));
        let mut file = fs::File::create(part.path()).await?;
        let mut written = 0u64;

        if let Some(offset) = append_at {
            // The name lock keeps this entry stable until we commit
            let current = self.index.read().await.get(name).copied();
            if let Some(entry) = current {
                let mut source = fs::File::open(blob_path(&self.root, &entry.blob))
                    .await
                    .map_err(|e| StorageError::from_io(name, e))?;
                let actual = source.metadata().await?.len();
                if actual != offset {
                    return Err(StorageError::OffsetMismatch {
                        expected: offset,
                        actual,
                    });
                }
                written = tokio::io::copy(&mut source, &mut file).await?;
            } else if offset != 0 {
                return Err(StorageError::OffsetMismatch {
                    expected: offset,
                    actual: 0,
                });
            }
        }

        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(|e| StorageError::Upload(e.to_string()))?;
            written += chunk.len() as u64;
            if written > self.max_object_size {
                return Err(StorageError::TooLarge {
                    max: self.max_object_size,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let blob = blob_path(&self.root, &id);
        fs::rename(part.path(), &blob).await?;
        part.disarm();

        let entry = IndexEntry::new(id);
        let previous = {
            let mut index = self.index.write().await;
            let previous = index.insert(name, entry);
            if let Err(e) = index.persist(&self.root).await {
                index.restore(name, previous);
                drop(index);
                if let Err(cleanup) = fs::remove_file(&blob).await {
                    tracing::warn!(blob = %blob.display(), error = %cleanup, "Failed to remove uncommitted blob");
                }
                return Err(e);
            }
            previous
        };

        if let Some(previous) = previous {
            let old = blob_path(&self.root, &previous.blob);
            // Open readers keep their handle; on platforms that refuse this the
            // blob is swept at next startup
            if let Err(e) = fs::remove_file(&old).await {
                tracing::warn!(blob = %old.display(), error = %e, "Failed to remove replaced blob");
            }
        }

        tracing::debug!(name = %name, key = %id, size = written, "Committed blob");

        Ok(StoredObject {
            name: name.to_string(),
            key: id.to_string(),
            size: written,
            stored_at: entry.stored_at,
        })
    }
}

#[async_trait]
impl ByteStore for LocalByteStore {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.index.read().await.get(name).is_some())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn size(&self, name: &str) -> StorageResult<u64> {
        let index = self.index.read().await;
        let entry = index
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        let metadata = fs::metadata(blob_path(&self.root, &entry.blob))
            .await
            .map_err(|e| StorageError::from_io(name, e))?;

        Ok(metadata.len())
    }

    #[instrument(skip(self, data), fields(backend = "filesystem"))]
    async fn write<'a>(&self, name: &str, data: UploadStream<'a>) -> StorageResult<StoredObject> {
        validate_name(name)?;
        let _lock = self.lock_name(name).await;
        self.write_locked(name, None, data).await
    }

    #[instrument(skip(self, data), fields(backend = "filesystem"))]
    async fn append<'a>(
        &self,
        name: &str,
        offset: u64,
        data: UploadStream<'a>,
    ) -> StorageResult<StoredObject> {
        validate_name(name)?;
        let _lock = self.lock_name(name).await;
        self.write_locked(name, Some(offset), data).await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn open(&self, name: &str) -> StorageResult<Box<dyn OpenedObject>> {
        let index = self.index.read().await;
        let entry = index
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        let file = fs::File::open(blob_path(&self.root, &entry.blob))
            .await
            .map_err(|e| StorageError::from_io(name, e))?;
        let size = file.metadata().await?.len();

        Ok(Box::new(LocalObject { file, size }))
    }
}

/// Open handle on one committed blob
struct LocalObject {
    file: fs::File,
    size: u64,
}

impl OpenedObject for LocalObject {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(self: Box<Self>, start: u64, end: u64) -> StorageResult<ByteStream> {
        check_range(start, end, self.size)?;
        Ok(read_stream(self.file, start, end - start + 1))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Stream exactly `len` bytes of `file` starting at `start`
fn read_stream(file: fs::File, start: u64, len: u64) -> ByteStream {
    let stream = async_stream::try_stream! {
        let mut file = file;
        file.seek(std::io::SeekFrom::Start(start)).await?;

        let mut remaining = len;
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        while remaining > 0 {
            let want = remaining.min(READ_CHUNK_SIZE as u64) as usize;
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                Err::<(), StorageError>(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "blob ended before the requested range",
                )))?;
            }
            remaining -= n as u64;
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    };

    Box::pin(stream)
}

/// Remove part files and blobs the index no longer references
async fn sweep(root: &Path, index: &NameIndex) -> StorageResult<usize> {
    let referenced = index.blobs();
    let mut removed = 0;

    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let path = entry.path();
        let stale = match path.extension().and_then(|ext| ext.to_str()) {
            Some(PART_EXTENSION) => true,
            Some(BLOB_EXTENSION) => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
                .is_some_and(|blob| !referenced.contains(&blob)),
            _ => false,
        };

        if stale {
            fs::remove_file(&path).await?;
            removed += 1;
        }
    }

    Ok(removed)
}

/// In-flight write file, deleted on drop unless committed
struct PartFile {
    path: PathBuf,
    armed: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove part file");
            }
        }
    }
}

/// Held while writing a name; drops its table entry when no one else waits
struct NameLock<'s> {
    table: &'s NameLockTable,
    name: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.table.lock();
        // One reference in the table, one here
        if Arc::strong_count(&self.lock) == 2 {
            table.remove(&self.name);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::{failing_upload, read_all, upload, yielding_upload};
    use tempfile::TempDir;

    const MAX: u64 = 1024 * 1024;

    async fn open_store(dir: &TempDir) -> LocalByteStore {
        LocalByteStore::open(dir.path(), MAX).await.unwrap()
    }

    fn files_with_extension(dir: &Path, ext: &str) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(ext))
            .count()
    }

    #[tokio::test]
    async fn test_write_then_query() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        assert!(!store.exists("clip.mp4").await.unwrap());

        let stored = store.write("clip.mp4", upload(b"hello world", 4)).await.unwrap();
        assert_eq!(stored.name, "clip.mp4");
        assert_eq!(stored.size, 11);
        assert!(Uuid::parse_str(&stored.key).is_ok());

        assert!(store.exists("clip.mp4").await.unwrap());
        assert_eq!(store.size("clip.mp4").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_size_of_missing_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let result = store.size("missing.mp4").await;
        assert!(matches!(result, Err(StorageError::NotFound(name)) if name == "missing.mp4"));
    }

    #[tokio::test]
    async fn test_read_range() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let data: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();

        store.write("clip.mp4", upload(&data, 7_000)).await.unwrap();

        let bytes = read_all(store.read_range("clip.mp4", 100, 150_099).await.unwrap()).await;
        assert_eq!(bytes, &data[100..150_100]);

        let last = read_all(store.read_range("clip.mp4", 199_999, 199_999).await.unwrap()).await;
        assert_eq!(last, &data[199_999..]);
    }

    #[tokio::test]
    async fn test_read_range_out_of_bounds() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store.write("clip.mp4", upload(b"0123456789", 10)).await.unwrap();

        let result = store.read_range("clip.mp4", 10, 10).await;
        assert!(matches!(
            result,
            Err(StorageError::RangeOutOfBounds { start: 10, size: 10, .. })
        ));

        let result = store.read_range("clip.mp4", 5, 10).await;
        assert!(matches!(result, Err(StorageError::RangeOutOfBounds { .. })));

        let result = store.read_range("missing.mp4", 0, 0).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replace_removes_previous_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let first = store.write("clip.mp4", upload(b"first version", 5)).await.unwrap();
        let second = store.write("clip.mp4", upload(b"second", 5)).await.unwrap();

        assert_ne!(first.key, second.key);
        assert_eq!(store.size("clip.mp4").await.unwrap(), 6);
        assert_eq!(files_with_extension(temp_dir.path(), BLOB_EXTENSION), 1);

        let bytes = read_all(store.read_range("clip.mp4", 0, 5).await.unwrap()).await;
        assert_eq!(bytes, b"second");
    }

    #[tokio::test]
    async fn test_reader_keeps_old_content_across_replace() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let old = vec![b'a'; 300_000];

        store.write("clip.mp4", upload(&old, 50_000)).await.unwrap();
        let stream = store.read_range("clip.mp4", 0, 299_999).await.unwrap();

        store.write("clip.mp4", upload(&vec![b'b'; 300_000], 50_000)).await.unwrap();

        if cfg!(unix) {
            assert_eq!(read_all(stream).await, old);
        }
        let fresh = read_all(store.read_range("clip.mp4", 0, 9).await.unwrap()).await;
        assert_eq!(fresh, b"bbbbbbbbbb");
    }

    #[tokio::test]
    async fn test_append_at_current_size() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.append("clip.mp4", 0, upload(b"hello ", 3)).await.unwrap();
        let stored = store.append("clip.mp4", 6, upload(b"world", 3)).await.unwrap();
        assert_eq!(stored.size, 11);

        let bytes = read_all(store.read_range("clip.mp4", 0, 10).await.unwrap()).await;
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn test_append_offset_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let result = store.append("new.mp4", 4, upload(b"data", 4)).await;
        assert!(matches!(
            result,
            Err(StorageError::OffsetMismatch { expected: 4, actual: 0 })
        ));
        assert!(!store.exists("new.mp4").await.unwrap());

        store.write("clip.mp4", upload(b"12345", 5)).await.unwrap();
        let result = store.append("clip.mp4", 3, upload(b"x", 1)).await;
        assert!(matches!(
            result,
            Err(StorageError::OffsetMismatch { expected: 3, actual: 5 })
        ));
        assert_eq!(store.size("clip.mp4").await.unwrap(), 5);
        assert_eq!(files_with_extension(temp_dir.path(), PART_EXTENSION), 0);
    }

    #[tokio::test]
    async fn test_too_large_leaves_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalByteStore::open(temp_dir.path(), 8).await.unwrap();

        store.write("clip.mp4", upload(b"small", 5)).await.unwrap();
        let result = store.write("clip.mp4", upload(b"far too large", 4)).await;

        assert!(matches!(result, Err(StorageError::TooLarge { max: 8 })));
        assert_eq!(store.size("clip.mp4").await.unwrap(), 5);
        assert_eq!(files_with_extension(temp_dir.path(), PART_EXTENSION), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_stream_is_not_committed() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let result = store.write("clip.mp4", failing_upload(b"partial")).await;

        assert!(matches!(result, Err(StorageError::Upload(_))));
        assert!(!store.exists("clip.mp4").await.unwrap());
        assert_eq!(files_with_extension(temp_dir.path(), PART_EXTENSION), 0);
        assert_eq!(files_with_extension(temp_dir.path(), BLOB_EXTENSION), 0);
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let result = store.write("", upload(b"data", 4)).await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_traversal_names_stay_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads");
        let store = LocalByteStore::open(&root, MAX).await.unwrap();

        store.write("../escape.mp4", upload(b"data", 4)).await.unwrap();

        assert!(!temp_dir.path().join("escape.mp4").exists());
        assert_eq!(store.size("../escape.mp4").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reopen_restores_index_and_sweeps() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir).await;
            store.write("clip.mp4", upload(b"persisted", 3)).await.unwrap();
        }

        std::fs::write(temp_dir.path().join(format!(".{}.part", Uuid::new_v4())), b"junk").unwrap();
        std::fs::write(temp_dir.path().join(format!("{}.blob", Uuid::new_v4())), b"orphan").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"unrelated").unwrap();

        let store = open_store(&temp_dir).await;
        assert_eq!(store.index.read().await.len(), 1);
        assert_eq!(store.size("clip.mp4").await.unwrap(), 9);
        assert_eq!(files_with_extension(temp_dir.path(), PART_EXTENSION), 0);
        assert_eq!(files_with_extension(temp_dir.path(), BLOB_EXTENSION), 1);
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_concurrent_writes_same_name_never_mix() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&temp_dir).await);
        let a = vec![b'a'; 100_000];
        let b = vec![b'b'; 100_000];

        let (ra, rb) = tokio::join!(
            store.write("clip.mp4", upload(&a, 1_000)),
            store.write("clip.mp4", upload(&b, 1_000)),
        );
        ra.unwrap();
        rb.unwrap();

        let bytes = read_all(store.read_range("clip.mp4", 0, 99_999).await.unwrap()).await;
        assert!(bytes == a || bytes == b);
        assert_eq!(files_with_extension(temp_dir.path(), BLOB_EXTENSION), 1);
        assert!(store.write_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_opened_object_is_consistent_across_replace() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store.write("clip.mp4", upload(&[b'o'; 20], 20)).await.unwrap();

        let opened = store.open("clip.mp4").await.unwrap();
        store.write("clip.mp4", upload(&[b'n'; 50], 50)).await.unwrap();

        assert_eq!(opened.size(), 20);
        if cfg!(unix) {
            let bytes = read_all(opened.read_range(0, 19).unwrap()).await;
            assert_eq!(bytes, vec![b'o'; 20]);
        }
        assert_eq!(store.open("clip.mp4").await.unwrap().size(), 50);
    }

    #[tokio::test]
    async fn test_dropped_stream_releases_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let data = vec![b'a'; 300_000];
        store.write("clip.mp4", upload(&data, 50_000)).await.unwrap();

        let mut stream = store.read_range("clip.mp4", 0, 299_999).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.is_empty() && first.len() <= READ_CHUNK_SIZE);
        drop(stream);

        store.write("clip.mp4", upload(b"replacement", 4)).await.unwrap();

        assert_eq!(files_with_extension(temp_dir.path(), BLOB_EXTENSION), 1);
        let bytes = read_all(store.read_range("clip.mp4", 0, 10).await.unwrap()).await;
        assert_eq!(bytes, b"replacement");
    }

    #[tokio::test]
    async fn test_concurrent_appends_same_offset() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let (ra, rb) = tokio::join!(
            store.append("clip.mp4", 0, yielding_upload(b"aaaa")),
            store.append("clip.mp4", 0, yielding_upload(b"bbbb")),
        );

        let results = [ra, rb];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StorageError::OffsetMismatch { expected: 0, actual: 4 })
        )));
        assert_eq!(store.size("clip.mp4").await.unwrap(), 4);
    }
}
