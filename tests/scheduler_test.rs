//! Conversion scheduler integration tests
//!
//! Drive [`Scheduler::submit`] against stub sources and backends and check
//! caching, retry accounting, admission limits and per-id exclusivity.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{fast_settings, StubBackend, StubSource, TestHarness, VIDEO};
use ugoiraforge::cache::ResultCache;
use ugoiraforge::conversion::SchedulerSettings;
use ugoiraforge_common::{ArtworkId, Error};

const ID: ArtworkId = ArtworkId::new(12345678);

#[tokio::test]
async fn converts_and_caches_result() {
    let h = TestHarness::new();

    let data = h.scheduler.submit(ID).await.unwrap();

    assert_eq!(data.as_ref(), VIDEO);
    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.backend.last_frame_count.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(h.cache.get(ID).await.as_deref(), Some(VIDEO));
    assert!(!h.scheduler.is_in_flight(ID));
}

#[tokio::test]
async fn in_memory_backend_receives_frames() {
    let h = TestHarness::with(StubSource::new(), StubBackend::new().in_memory(), fast_settings());

    let data = h.scheduler.submit(ID).await.unwrap();

    assert_eq!(data.as_ref(), VIDEO);
    assert_eq!(h.backend.last_frame_count.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cache_hit_skips_pipeline() {
    let h = TestHarness::new();
    h.scheduler.submit(ID).await.unwrap();

    let again = h.scheduler.submit(ID).await.unwrap();

    assert_eq!(again.as_ref(), VIDEO);
    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.source.metadata_calls(), 1);
}

#[tokio::test]
async fn ineligible_source_is_not_retried() {
    let h = TestHarness::with(StubSource::new().ineligible(), StubBackend::new(), fast_settings());

    let err = h.scheduler.submit(ID).await.unwrap_err();

    assert_matches!(err, Error::IneligibleSource { id, .. } if id == ID);
    assert_eq!(h.source.metadata_calls(), 1);
    assert_eq!(h.source.archive_calls(), 0);
    assert_eq!(h.backend.calls(), 0);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn persistent_failure_exhausts_retry_budget() {
    let h = TestHarness::with(
        StubSource::new().failing_archive(u32::MAX),
        StubBackend::new(),
        fast_settings(),
    );

    let err = h.scheduler.submit(ID).await.unwrap_err();

    // One initial attempt plus three retries
    assert_matches!(err, Error::RetryBudgetExhausted { id, attempts: 4 } if id == ID);
    assert_eq!(h.source.archive_calls(), 4);
    assert_eq!(h.backend.calls(), 0);
    assert!(h.cache.get(ID).await.is_none());
    assert!(!h.scheduler.is_in_flight(ID));
}

#[tokio::test]
async fn succeeds_on_last_permitted_attempt() {
    let h = TestHarness::with(
        StubSource::new().failing_archive(3),
        StubBackend::new(),
        fast_settings(),
    );

    let data = h.scheduler.submit(ID).await.unwrap();

    assert_eq!(data.as_ref(), VIDEO);
    assert_eq!(h.source.archive_calls(), 4);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn smaller_budget_stops_earlier() {
    let settings = SchedulerSettings {
        max_retries: 2,
        ..fast_settings()
    };
    let h = TestHarness::with(StubSource::new().failing_archive(3), StubBackend::new(), settings);

    let err = h.scheduler.submit(ID).await.unwrap_err();

    assert_matches!(err, Error::RetryBudgetExhausted { attempts: 3, .. });
    assert_eq!(h.source.archive_calls(), 3);
}

#[tokio::test]
async fn transient_metadata_failure_recovers() {
    let h = TestHarness::with(
        StubSource::new().failing_metadata(1),
        StubBackend::new(),
        fast_settings(),
    );

    h.scheduler.submit(ID).await.unwrap();

    assert_eq!(h.source.metadata_calls(), 2);
    assert_eq!(h.source.archive_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_separates_attempts() {
    let h = TestHarness::with(
        StubSource::new().failing_archive(u32::MAX),
        StubBackend::new(),
        SchedulerSettings::default(),
    );
    let start = tokio::time::Instant::now();

    let err = h.scheduler.submit(ID).await.unwrap_err();

    assert_matches!(err, Error::RetryBudgetExhausted { attempts: 4, .. });
    assert!(start.elapsed() >= Duration::from_millis(3 * 2000));
}

#[tokio::test]
async fn empty_frame_list_never_reaches_backend() {
    let h = TestHarness::with(
        StubSource::new().with_frames(Vec::new()),
        StubBackend::new(),
        fast_settings(),
    );

    let err = h.scheduler.submit(ID).await.unwrap_err();

    assert_matches!(err, Error::RetryBudgetExhausted { .. });
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.source.archive_calls(), 0);
}

#[tokio::test]
async fn concurrency_stays_within_limit() {
    let settings = SchedulerSettings {
        concurrency_limit: 2,
        ..fast_settings()
    };
    let h = TestHarness::with(
        StubSource::new(),
        StubBackend::new().with_delay(Duration::from_millis(50)),
        settings,
    );

    let tasks: Vec<_> = (1..=6u64)
        .map(|n| {
            let scheduler = Arc::clone(&h.scheduler);
            tokio::spawn(async move { scheduler.submit(ArtworkId::new(n)).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().is_ok());
    }

    assert_eq!(h.backend.calls(), 6);
    assert!(h.backend.max_active() <= 2);
    assert_eq!(h.scheduler.in_flight_len(), 0);
}

#[tokio::test]
async fn concurrent_requests_for_same_id_share_one_conversion() {
    let h = TestHarness::with(
        StubSource::new(),
        StubBackend::new().with_delay(Duration::from_millis(100)),
        fast_settings(),
    );

    let first = {
        let scheduler = Arc::clone(&h.scheduler);
        tokio::spawn(async move { scheduler.submit(ID).await })
    };
    let second = {
        let scheduler = Arc::clone(&h.scheduler);
        tokio::spawn(async move { scheduler.submit(ID).await })
    };

    let (a, b) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());

    assert_eq!(a, b);
    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.source.metadata_calls(), 1);
}

#[tokio::test]
async fn failed_conversion_releases_id() {
    let h = TestHarness::with(StubSource::new().ineligible(), StubBackend::new(), fast_settings());

    h.scheduler.submit(ID).await.unwrap_err();
    assert!(!h.scheduler.is_in_flight(ID));

    // A later request is admitted again
    h.scheduler.submit(ID).await.unwrap_err();
    assert_eq!(h.source.metadata_calls(), 2);
}

#[tokio::test]
async fn abandoned_request_still_completes_and_caches() {
    let h = TestHarness::with(
        StubSource::new(),
        StubBackend::new().with_delay(Duration::from_millis(200)),
        fast_settings(),
    );

    let abandoned = tokio::time::timeout(Duration::from_millis(50), h.scheduler.submit(ID)).await;
    assert!(abandoned.is_err());
    assert!(h.scheduler.is_in_flight(ID));

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.scheduler.is_in_flight(ID) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("conversion never finished");

    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.cache.get(ID).await.as_deref(), Some(VIDEO));
    assert_eq!(h.scheduler.in_flight_len(), 0);

    // The next request is served from the cache
    h.scheduler.submit(ID).await.unwrap();
    assert_eq!(h.backend.calls(), 1);
}
