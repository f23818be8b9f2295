//! File-backed record store
//!
//! One JSON document per record at `<root>/<namespace>/<kind>/<name>.json`.
//! Create-if-absent is a hard link of a fully written temp file onto the
//! record path, which the filesystem refuses atomically when the path exists.
//! Updates write a temp file and rename it over the record.
//!
//! Records carry secret material, so every record file is created owner-only
//! (`KEYRING_FILE_MODE`) and every directory below the root `CONFIG_DIR_MODE`.

use crate::record::{Record, RecordKey, RecordStore};
use async_trait::async_trait;
use cairn_core::{Error, Result, CONFIG_DIR_MODE, KEYRING_FILE_MODE};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::instrument;

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// File-backed record store
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`; directories are created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.root
            .join(&key.namespace)
            .join(key.kind.as_str())
            .join(format!("{}.json", key.name))
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let seq = TEMP_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq))
    }

    fn encode(key: &RecordKey, record: &Record) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(record).map_err(|e| Error::StorageWriteFailed {
            key: key.to_string(),
            reason: format!("failed to encode record: {}", e),
        })
    }

    /// Write `bytes` to a fresh temp file next to `path`, returning its path
    async fn write_temp(&self, key: &RecordKey, path: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::internal(format!("record path {} has no parent", path.display())))?;
        let mut dirs = tokio::fs::DirBuilder::new();
        dirs.recursive(true);
        #[cfg(unix)]
        dirs.mode(CONFIG_DIR_MODE);
        dirs.create(parent).await.map_err(|e| write_failed(key, e))?;

        let temp = self.temp_path(path);
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(KEYRING_FILE_MODE);

        let written = async {
            let mut file = options.open(&temp).await?;
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            discard_temp(&temp).await;
            return Err(write_failed(key, e));
        }
        Ok(temp)
    }
}

/// Remove a temp file this store created; failure only leaks the file
async fn discard_temp(temp: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %temp.display(), error = %e, "Failed to remove temp record");
        }
    }
}

fn write_failed(key: &RecordKey, e: std::io::Error) -> Error {
    Error::StorageWriteFailed {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl RecordStore for FileStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &RecordKey) -> Result<Record> {
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(key.not_found()),
            Err(e) => {
                return Err(Error::StorageReadFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| Error::StorageReadFailed {
            key: key.to_string(),
            reason: format!("corrupt record: {}", e),
        })
    }

    #[instrument(skip(self, record), fields(key = %key))]
    async fn create(&self, key: &RecordKey, record: &Record) -> Result<()> {
        let path = self.record_path(key);
        let bytes = Self::encode(key, record)?;
        let temp = self.write_temp(key, &path, &bytes).await?;

        let linked = tokio::fs::hard_link(&temp, &path).await;
        discard_temp(&temp).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(key.conflict()),
            Err(e) => Err(write_failed(key, e)),
        }
    }

    #[instrument(skip(self, record), fields(key = %key))]
    async fn update(&self, key: &RecordKey, record: &Record) -> Result<()> {
        let path = self.record_path(key);
        match tokio::fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(key.not_found()),
            Err(e) => {
                return Err(Error::StorageReadFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let bytes = Self::encode(key, record)?;
        let temp = self.write_temp(key, &path, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            discard_temp(&temp).await;
            return Err(write_failed(key, e));
        }
        Ok(())
    }
}
