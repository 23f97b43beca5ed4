//! Warm tier: durable JSON-file store.
//!
//! One file per key under a directory, named by the SHA-256 of the key.
//! Writes go to a temporary file and are renamed into place, so readers
//! never see a partial entry. Expired entries are removed lazily on read.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::tier::{CacheTier, CachedResponse};
use crate::{HeimdallError, Result};

/// Distinguishes concurrent writes to the same key within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Durable, higher-capacity cache tier backed by the filesystem.
pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location: `~/.cache/heimdall/warm`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("heimdall")
            .join("warm")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{name}.json"))
    }
}

impl Default for FileTier {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

fn backend_error(action: &str, path: &Path, e: impl std::fmt::Display) -> HeimdallError {
    HeimdallError::CacheBackend(format!("failed to {action} {}: {e}", path.display()))
}

#[async_trait]
impl CacheTier for FileTier {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(backend_error("read", &path, e)),
        };
        let entry: CachedResponse = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "removing unreadable warm entry");
                let _ = tokio::fs::remove_file(&path).await;
                return Err(backend_error("parse", &path, e));
            }
        };

        if entry.is_fresh(Utc::now()) {
            Ok(Some(entry))
        } else {
            debug!(path = %path.display(), "removing expired warm entry");
            // Another worker may have removed or replaced it already.
            let _ = tokio::fs::remove_file(&path).await;
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: CachedResponse) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| backend_error("create", &self.dir, e))?;

        let path = self.path_for(key);
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
        let json = serde_json::to_vec(&value)?;
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| backend_error("write", &tmp_path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(backend_error("rename", &tmp_path, e));
        }
        Ok(())
    }
}
