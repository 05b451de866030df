//! Name Index
//!
//! Maps client-supplied file names to internal blob keys. Client names are
//! opaque: they never become path components, so a name like `../etc/passwd`
//! is just another key.
//!
//! The index is persisted as `index.json` inside the upload directory and
//! rewritten with a temp-file-and-rename on every commit.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::{StorageError, StorageResult};

/// Index file name inside the upload directory
pub const INDEX_FILE: &str = "index.json";

/// Maximum accepted name length in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Blob file extension
pub const BLOB_EXTENSION: &str = "blob";

/// Temp file extension for in-flight writes
pub const PART_EXTENSION: &str = "part";

/// Where the current content of a name lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub blob: Uuid,
    pub stored_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn new(blob: Uuid) -> Self {
        Self {
            blob,
            stored_at: Utc::now(),
        }
    }
}

/// Persisted name -> blob mapping
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NameIndex {
    entries: HashMap<String, IndexEntry>,
}

impl NameIndex {
    /// Load the index from `dir`, starting empty if none was written yet
    pub async fn load(dir: &Path) -> StorageResult<Self> {
        match tokio::fs::read(dir.join(INDEX_FILE)).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Write the index to `dir` atomically
    pub async fn persist(&self, dir: &Path) -> StorageResult<()> {
        let data = serde_json::to_vec_pretty(self)?;
        let temp_path = dir.join(format!("{}.{}", INDEX_FILE, PART_EXTENSION));

        {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp_path, dir.join(INDEX_FILE)).await?;

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.entries.get(name)
    }

    /// Point `name` at a new blob, returning the entry it replaced
    pub fn insert(&mut self, name: &str, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(name.to_string(), entry)
    }

    /// Undo an `insert` that could not be persisted
    pub fn restore(&mut self, name: &str, previous: Option<IndexEntry>) {
        match previous {
            Some(entry) => {
                self.entries.insert(name.to_string(), entry);
            }
            None => {
                self.entries.remove(name);
            }
        }
    }

    /// All blobs currently referenced
    pub fn blobs(&self) -> HashSet<Uuid> {
        self.entries.values().map(|entry| entry.blob).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Path of a committed blob
pub fn blob_path(dir: &Path, blob: &Uuid) -> PathBuf {
    dir.join(format!("{}.{}", blob, BLOB_EXTENSION))
}

/// Path of an in-flight write
pub fn part_path(dir: &Path, id: &Uuid) -> PathBuf {
    dir.join(format!(".{}.{}", id, PART_EXTENSION))
}

/// Reject names that cannot be used as index keys
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("name is empty".to_string()));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(StorageError::InvalidName(format!(
            "name exceeds {} bytes",
            MAX_NAME_LEN
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(StorageError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }

    Ok(())
}
