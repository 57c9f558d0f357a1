//! Shared test harness for integration tests.
//!
//! Provides a scriptable [`StubSource`] and [`StubBackend`] so the scheduler
//! and HTTP layer can be exercised without pixiv or ffmpeg, plus
//! [`TestHarness`] which wires them into a [`Scheduler`]. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use zip::write::SimpleFileOptions;

use ugoiraforge::cache::{MemoryCache, ResultCache};
use ugoiraforge::config::Config;
use ugoiraforge::conversion::{Scheduler, SchedulerSettings};
use ugoiraforge::server::{create_router, AppContext};
use ugoiraforge::source::UgoiraSource;
use ugoiraforge_av::{EncodeGraph, EncodingBackend, FrameData, FrameSet, FrameStorage};
use ugoiraforge_common::{frames_from_delays, ArtworkId, Error, Frame, Result, UgoiraMeta};

/// Bytes every successful stub encode produces.
pub const VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42 stub video";

pub const ARCHIVE_URL: &str = "https://i.pximg.net/img-zip-ugoira/test_ugoira1920x1080.zip";

/// Build a zip holding the given `(name, contents)` entries.
pub fn zip_of(entries: &[(&str, &str)]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(contents.as_bytes()).expect("write zip entry");
    }
    Bytes::from(writer.finish().expect("finish zip").into_inner())
}

/// Three frames of 100, 200 and 300 ms.
pub fn sample_frames() -> Vec<Frame> {
    frames_from_delays([("000000.jpg", 100), ("000001.jpg", 200), ("000002.jpg", 300)])
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// [`UgoiraSource`] with scripted failures and call counters.
pub struct StubSource {
    frames: Vec<Frame>,
    archive: Bytes,
    ineligible: bool,
    metadata_failures: AtomicU32,
    archive_failures: AtomicU32,
    pub metadata_calls: AtomicUsize,
    pub archive_calls: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        let frames = sample_frames();
        let entries: Vec<(&str, &str)> = frames
            .iter()
            .map(|f| (f.source_file.as_str(), "jpeg"))
            .collect();
        let archive = zip_of(&entries);

        Self {
            frames,
            archive,
            ineligible: false,
            metadata_failures: AtomicU32::new(0),
            archive_failures: AtomicU32::new(0),
            metadata_calls: AtomicUsize::new(0),
            archive_calls: AtomicUsize::new(0),
        }
    }

    /// Metadata reports `error: true` for every id.
    pub fn ineligible(mut self) -> Self {
        self.ineligible = true;
        self
    }

    /// Replace the frame list without touching the archive.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// The first `n` metadata requests fail transiently.
    pub fn failing_metadata(self, n: u32) -> Self {
        self.metadata_failures.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` archive downloads fail. `u32::MAX` means always.
    pub fn failing_archive(self, n: u32) -> Self {
        self.archive_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn archive_calls(&self) -> usize {
        self.archive_calls.load(Ordering::SeqCst)
    }
}

/// Consume one scripted failure, if any remain.
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
            0 => None,
            u32::MAX => Some(u32::MAX),
            n => Some(n - 1),
        })
        .is_ok()
}

#[async_trait]
impl UgoiraSource for StubSource {
    async fn fetch_metadata(&self, id: ArtworkId) -> Result<UgoiraMeta> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.ineligible {
            return Err(Error::ineligible(id, "Artwork has been deleted or does not exist"));
        }
        if take_failure(&self.metadata_failures) {
            return Err(Error::metadata("upstream returned 503"));
        }
        Ok(UgoiraMeta {
            original_src: ARCHIVE_URL.to_string(),
            frames: self.frames.clone(),
        })
    }

    async fn fetch_archive(&self, url: &str) -> Result<Bytes> {
        self.archive_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(url, ARCHIVE_URL);
        if take_failure(&self.archive_failures) {
            return Err(Error::archive("connection reset"));
        }
        Ok(self.archive.clone())
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// [`EncodingBackend`] that writes [`VIDEO`] after an optional delay and
/// records how many encodes overlap.
pub struct StubBackend {
    storage: FrameStorage,
    delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub last_frame_count: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            storage: FrameStorage::Directory,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            last_frame_count: AtomicUsize::new(0),
        }
    }

    pub fn in_memory(mut self) -> Self {
        self.storage = FrameStorage::Memory;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EncodingBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn frame_storage(&self) -> FrameStorage {
        self.storage
    }

    async fn encode(&self, frames: &FrameSet, graph: &EncodeGraph, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        self.last_frame_count.store(frames.len(), Ordering::SeqCst);
        assert_eq!(graph.inputs().len(), frames.len());

        if let FrameData::Directory(dir) = frames.data() {
            for frame in frames.frames() {
                if !dir.join(&frame.source_file).is_file() {
                    return Err(Error::encode(format!("missing {}", frame.source_file)));
                }
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        tokio::fs::write(output, VIDEO).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Settings with a short backoff so retry tests stay fast.
pub fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        retry_backoff: Duration::from_millis(10),
        ..SchedulerSettings::default()
    }
}

/// A scheduler wired to stub collaborators and an in-memory cache.
pub struct TestHarness {
    pub source: Arc<StubSource>,
    pub backend: Arc<StubBackend>,
    pub cache: Arc<MemoryCache>,
    pub scheduler: Arc<Scheduler>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with(StubSource::new(), StubBackend::new(), fast_settings())
    }

    pub fn with(source: StubSource, backend: StubBackend, settings: SchedulerSettings) -> Self {
        let source = Arc::new(source);
        let backend = Arc::new(backend);
        let cache = Arc::new(MemoryCache::new(4));
        let scheduler = Arc::new(Scheduler::new(
            source.clone(),
            backend.clone(),
            cache.clone() as Arc<dyn ResultCache>,
            settings,
        ));

        Self {
            source,
            backend,
            cache,
            scheduler,
        }
    }

    pub fn context(&self) -> AppContext {
        AppContext {
            config: Arc::new(Config::default()),
            scheduler: self.scheduler.clone(),
        }
    }

    /// Start an Axum server on a random port and return the bound address.
    pub async fn serve(&self) -> SocketAddr {
        let app = create_router(self.context());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Harness plus running server.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let addr = harness.serve().await;
        (harness, addr)
    }
}
