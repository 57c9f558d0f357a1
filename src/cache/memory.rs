//! In-process result cache.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use ugoiraforge_common::{ArtworkId, Result};

use super::{CacheIndex, ResultCache};

/// Keeps finished videos in memory.
pub struct MemoryCache {
    index: Mutex<CacheIndex<Bytes>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            index: Mutex::new(CacheIndex::new(capacity)),
        }
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, id: ArtworkId) -> Option<Bytes> {
        self.index.lock().get(id).cloned()
    }

    async fn put(&self, id: ArtworkId, data: Bytes, created_at: DateTime<Utc>) -> Result<()> {
        self.index.lock().insert(id, created_at, data);
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.lock().len()
    }

    fn capacity(&self) -> usize {
        self.index.lock().capacity()
    }
}
