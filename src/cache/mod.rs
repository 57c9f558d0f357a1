//! Bounded cache of finished conversions.
//!
//! Both variants keep a structured index of `id -> { created_at, location }`
//! and evict the entry with the oldest creation time once capacity is
//! exceeded. Reads do not refresh an entry's age.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ugoiraforge_common::{ArtworkId, Result};

use crate::config::{CacheConfig, CacheMode};

/// Store of recent successful outputs.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Cached video for `id`, if any.
    async fn get(&self, id: ArtworkId) -> Option<Bytes>;

    /// Store a video, evicting the oldest entries beyond capacity.
    async fn put(&self, id: ArtworkId, data: Bytes, created_at: DateTime<Utc>) -> Result<()>;

    /// Number of cached entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries kept.
    fn capacity(&self) -> usize;
}

/// Build the cache described by the `[cache]` config section.
pub fn open_cache(config: &CacheConfig) -> Result<Arc<dyn ResultCache>> {
    Ok(match config.mode {
        CacheMode::Memory => Arc::new(MemoryCache::new(config.capacity)),
        CacheMode::Disk => Arc::new(DiskCache::open(&config.dir, config.capacity)?),
    })
}

struct Record<L> {
    created_at: DateTime<Utc>,
    seq: u64,
    location: L,
}

/// Capacity-bounded record store ordered by creation time.
///
/// Ties on `created_at` are broken by insertion order.
pub(crate) struct CacheIndex<L> {
    records: HashMap<ArtworkId, Record<L>>,
    capacity: usize,
    next_seq: u64,
}

impl<L> CacheIndex<L> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    pub(crate) fn get(&self, id: ArtworkId) -> Option<&L> {
        self.records.get(&id).map(|r| &r.location)
    }

    /// Insert or replace `id`, returning every location dropped from the index.
    pub(crate) fn insert(&mut self, id: ArtworkId, created_at: DateTime<Utc>, location: L) -> Vec<L> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let mut dropped = Vec::new();
        if let Some(old) = self.records.insert(
            id,
            Record {
                created_at,
                seq,
                location,
            },
        ) {
            dropped.push(old.location);
        }

        while self.records.len() > self.capacity {
            match self.evict_oldest() {
                Some(location) => dropped.push(location),
                None => break,
            }
        }
        dropped
    }

    pub(crate) fn remove(&mut self, id: ArtworkId) -> Option<L> {
        self.records.remove(&id).map(|r| r.location)
    }

    fn evict_oldest(&mut self) -> Option<L> {
        let oldest = self
            .records
            .iter()
            .min_by_key(|(_, r)| (r.created_at, r.seq))
            .map(|(id, _)| *id)?;
        tracing::debug!(artwork_id = %oldest, "Evicting cached conversion");
        self.remove(oldest)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn evicts_smallest_created_at() {
        let mut index = CacheIndex::new(2);
        assert!(index.insert(ArtworkId::new(1), at(300), "one").is_empty());
        assert!(index.insert(ArtworkId::new(2), at(100), "two").is_empty());

        let dropped = index.insert(ArtworkId::new(3), at(200), "three");
        assert_eq!(dropped, ["two"]);
        assert_eq!(index.len(), 2);
        assert!(index.get(ArtworkId::new(2)).is_none());
        assert_eq!(index.get(ArtworkId::new(1)), Some(&"one"));
    }

    #[test]
    fn reinsert_replaces_location() {
        let mut index = CacheIndex::new(2);
        index.insert(ArtworkId::new(1), at(100), "old");
        let dropped = index.insert(ArtworkId::new(1), at(200), "new");
        assert_eq!(dropped, ["old"]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(ArtworkId::new(1)), Some(&"new"));
    }

    #[test]
    fn ties_fall_back_to_insertion_order() {
        let mut index = CacheIndex::new(1);
        index.insert(ArtworkId::new(1), at(100), 1);
        let dropped = index.insert(ArtworkId::new(2), at(100), 2);
        assert_eq!(dropped, [1]);
    }
}
