//! Filesystem-backed result cache.
//!
//! Videos are stored as `<created_at_ms>-<id>.mp4` in one directory. The file
//! name is only parsed once, when the directory is scanned at startup; after
//! that the in-memory index is authoritative.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use ugoiraforge_common::{ArtworkId, Result};

use super::{CacheIndex, ResultCache};

/// Keeps finished videos on disk.
pub struct DiskCache {
    dir: PathBuf,
    index: Mutex<CacheIndex<PathBuf>>,
}

impl DiskCache {
    /// Open (creating if needed) the cache directory and index its contents.
    ///
    /// Files that do not follow the naming scheme are left alone. If the
    /// directory holds more entries than `capacity`, the oldest are deleted.
    pub fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if let Some((created_at, id)) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_file_name)
            {
                found.push((created_at, id, path));
            }
        }
        found.sort_by_key(|(created_at, _, _)| *created_at);

        let mut index = CacheIndex::new(capacity);
        let mut stale = Vec::new();
        for (created_at, id, path) in found {
            stale.extend(index.insert(id, created_at, path));
        }
        for path in stale {
            remove_file(&path);
        }

        tracing::info!("Disk cache at {:?} holds {} entries", dir, index.len());

        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    fn path_for(&self, id: ArtworkId, created_at: DateTime<Utc>) -> PathBuf {
        self.dir.join(file_name(id, created_at))
    }
}

#[async_trait]
impl ResultCache for DiskCache {
    async fn get(&self, id: ArtworkId) -> Option<Bytes> {
        let path = self.index.lock().get(id).cloned()?;
        match tokio::fs::read(&path).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                tracing::warn!(artwork_id = %id, "Cached file {:?} unreadable: {}", path, e);
                let mut index = self.index.lock();
                if index.get(id) == Some(&path) {
                    index.remove(id);
                }
                None
            }
        }
    }

    async fn put(&self, id: ArtworkId, data: Bytes, created_at: DateTime<Utc>) -> Result<()> {
        let path = self.path_for(id, created_at);
        tokio::fs::write(&path, &data).await?;

        let (dropped, kept) = {
            let mut index = self.index.lock();
            let dropped = index.insert(id, created_at, path.clone());
            (dropped, index.get(id) == Some(&path))
        };
        // Re-putting at the same millisecond reuses the path; only spare it
        // while the index still points at it.
        for old in dropped.iter().filter(|old| !(kept && **old == path)) {
            remove_file(old);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.lock().len()
    }

    fn capacity(&self) -> usize {
        self.index.lock().capacity()
    }
}

fn file_name(id: ArtworkId, created_at: DateTime<Utc>) -> String {
    format!("{}-{}.mp4", created_at.timestamp_millis(), id)
}

/// Parse `<created_at_ms>-<id>.mp4`.
fn parse_file_name(name: &str) -> Option<(DateTime<Utc>, ArtworkId)> {
    let stem = name.strip_suffix(".mp4")?;
    let (millis, id) = stem.split_once('-')?;
    let millis: i64 = millis.parse().ok()?;
    let created_at = Utc.timestamp_millis_opt(millis).single()?;
    let id: ArtworkId = id.parse().ok()?;
    Some((created_at, id))
}

fn remove_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove evicted cache file {:?}: {}", path, e);
        }
    }
}
