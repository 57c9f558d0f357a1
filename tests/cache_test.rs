//! Result cache integration tests
//!
//! The scheduler over a disk-backed cache: eviction of the oldest result and
//! reuse of cached files across restarts.

mod common;

use std::sync::Arc;

use common::{fast_settings, StubBackend, StubSource, VIDEO};
use tempfile::tempdir;
use ugoiraforge::cache::open_cache;
use ugoiraforge::config::{CacheConfig, CacheMode};
use ugoiraforge::conversion::Scheduler;
use ugoiraforge_common::ArtworkId;

fn disk_config(dir: &std::path::Path) -> CacheConfig {
    CacheConfig {
        mode: CacheMode::Disk,
        capacity: 4,
        dir: dir.to_path_buf(),
    }
}

fn mp4_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".mp4"))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn fifth_result_evicts_the_oldest() {
    let dir = tempdir().unwrap();
    let cache = open_cache(&disk_config(dir.path())).unwrap();
    let backend = Arc::new(StubBackend::new());
    let scheduler = Scheduler::new(
        Arc::new(StubSource::new()),
        backend.clone(),
        cache.clone(),
        fast_settings(),
    );

    for n in 1..=5u64 {
        scheduler.submit(ArtworkId::new(n)).await.unwrap();
        // Distinct creation timestamps
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert_eq!(cache.len(), 4);
    assert!(cache.get(ArtworkId::new(1)).await.is_none());
    for n in 2..=5u64 {
        assert_eq!(cache.get(ArtworkId::new(n)).await.as_deref(), Some(VIDEO));
    }
    let files = mp4_files(dir.path());
    assert_eq!(files.len(), 4);
    assert!(files.iter().all(|f| !f.ends_with("-1.mp4")));

    // Evicted id converts again
    scheduler.submit(ArtworkId::new(1)).await.unwrap();
    assert_eq!(backend.calls(), 6);
}

#[tokio::test]
async fn cached_files_survive_restart() {
    let dir = tempdir().unwrap();
    let id = ArtworkId::new(44920385);

    {
        let cache = open_cache(&disk_config(dir.path())).unwrap();
        let scheduler = Scheduler::new(
            Arc::new(StubSource::new()),
            Arc::new(StubBackend::new()),
            cache,
            fast_settings(),
        );
        scheduler.submit(id).await.unwrap();
    }

    let source = Arc::new(StubSource::new());
    let backend = Arc::new(StubBackend::new());
    let scheduler = Scheduler::new(
        source.clone(),
        backend.clone(),
        open_cache(&disk_config(dir.path())).unwrap(),
        fast_settings(),
    );

    let data = scheduler.submit(id).await.unwrap();

    assert_eq!(data.as_ref(), VIDEO);
    assert_eq!(source.metadata_calls(), 0);
    assert_eq!(backend.calls(), 0);
}
