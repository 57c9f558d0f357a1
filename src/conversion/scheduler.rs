//! The conversion scheduler.
//!
//! [`Scheduler::submit`] turns an artwork id into MP4 bytes. It consults the
//! result cache, bounds how many conversions run at once with a FIFO
//! semaphore, makes sure a given id is converted by at most one caller at a
//! time, and retries transient failures with a fixed backoff.
//!
//! An admitted conversion runs on its own task. Dropping the caller's future
//! does not cancel it; the result still lands in the cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use ugoiraforge_av::{EncodeGraph, EncodingBackend, JobWorkspace};
use ugoiraforge_common::{ArtworkId, ConversionJob, Error, Result};

use crate::cache::ResultCache;
use crate::config::Config;
use crate::source::{load_frames, UgoiraSource};

/// Tunables for [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Conversions allowed to run at once.
    pub concurrency_limit: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
    /// Root for per-job scratch directories.
    pub work_dir: Option<PathBuf>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            max_retries: 3,
            retry_backoff: Duration::from_millis(2000),
            work_dir: None,
        }
    }
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            concurrency_limit: config.scheduler.concurrency_limit,
            max_retries: config.scheduler.max_retries,
            retry_backoff: Duration::from_millis(config.scheduler.retry_backoff_ms),
            work_dir: config.encoder.work_dir.clone(),
        }
    }
}

type InFlight = Arc<Mutex<HashMap<ArtworkId, watch::Receiver<()>>>>;

/// Exclusive hold on an id while it is being converted.
///
/// Dropping the claim, on any path, removes the id from the in-flight map,
/// wakes callers waiting on the same id and frees the concurrency slot.
struct Claim {
    id: ArtworkId,
    in_flight: InFlight,
    _release: watch::Sender<()>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
        debug!(artwork_id = %self.id, "Released in-flight claim");
    }
}

enum Admission {
    Claimed(Claim),
    Wait(watch::Receiver<()>),
}

/// The collaborators a conversion task needs.
struct Pipeline {
    source: Arc<dyn UgoiraSource>,
    backend: Arc<dyn EncodingBackend>,
    cache: Arc<dyn ResultCache>,
    settings: SchedulerSettings,
}

/// Owns the in-flight set and drives conversions through the injected
/// source, backend, and cache.
///
/// Cheap to share: wrap in an `Arc` and hand it to every request handler.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn UgoiraSource>,
        backend: Arc<dyn EncodingBackend>,
        cache: Arc<dyn ResultCache>,
        settings: SchedulerSettings,
    ) -> Self {
        let limit = settings.concurrency_limit.max(1);
        Self {
            pipeline: Arc::new(Pipeline {
                source,
                backend,
                cache,
                settings,
            }),
            permits: Arc::new(Semaphore::new(limit)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of ids currently being converted.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, id: ArtworkId) -> bool {
        self.in_flight.lock().contains_key(&id)
    }

    /// Convert `id`, or return the cached result.
    ///
    /// # Errors
    ///
    /// - [`Error::IneligibleSource`] when the artwork is not an animation.
    /// - [`Error::RetryBudgetExhausted`] when every attempt failed.
    pub async fn submit(&self, id: ArtworkId) -> Result<Bytes> {
        let claim = loop {
            if let Some(data) = self.pipeline.cache.get(id).await {
                debug!(artwork_id = %id, "Cache hit");
                return Ok(data);
            }

            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| Error::internal("scheduler is shut down"))?;

            match self.admit(id, permit) {
                Admission::Claimed(claim) => break claim,
                Admission::Wait(mut released) => {
                    debug!(artwork_id = %id, "Conversion already in flight, waiting");
                    // Err means the sender is gone, which is the signal.
                    let _ = released.changed().await;
                }
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        let job = tokio::spawn(async move {
            let _claim = claim;
            pipeline.run(id).await
        });

        job.await
            .map_err(|e| Error::internal(format!("conversion task for {id} failed: {e}")))?
    }

    fn admit(&self, id: ArtworkId, permit: OwnedSemaphorePermit) -> Admission {
        let mut in_flight = self.in_flight.lock();
        if let Some(released) = in_flight.get(&id) {
            return Admission::Wait(released.clone());
        }

        let (release, released) = watch::channel(());
        in_flight.insert(id, released);
        Admission::Claimed(Claim {
            id,
            in_flight: Arc::clone(&self.in_flight),
            _release: release,
            _permit: permit,
        })
    }
}

impl Pipeline {
    async fn run(&self, id: ArtworkId) -> Result<Bytes> {
        let mut job = ConversionJob::new(id);
        job.start();
        info!(artwork_id = %id, backend = self.backend.name(), "Conversion started");

        loop {
            match self.attempt(id).await {
                Ok(data) => {
                    job.succeed();
                    if let Err(e) = self.cache.put(id, data.clone(), Utc::now()).await {
                        warn!(artwork_id = %id, "Failed to cache conversion: {}", e);
                    }
                    info!(
                        artwork_id = %id,
                        attempts = job.attempts(),
                        bytes = data.len(),
                        "Conversion succeeded"
                    );
                    return Ok(data);
                }
                Err(e) if !e.is_retryable() => {
                    job.fail();
                    warn!(artwork_id = %id, "Conversion failed: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(artwork_id = %id, attempt = job.attempts(), "Conversion attempt failed: {}", e);
                    if !job.retry(self.settings.max_retries) {
                        job.fail();
                        let attempts = job.attempts();
                        warn!(artwork_id = %id, attempts, "Retry budget exhausted");
                        return Err(Error::RetryBudgetExhausted { id, attempts });
                    }
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
            }
        }
    }

    /// One pass through metadata, archive, graph, and encode.
    async fn attempt(&self, id: ArtworkId) -> Result<Bytes> {
        let meta = self.source.fetch_metadata(id).await?;
        let graph = EncodeGraph::build(&meta.frames)?;
        debug!(artwork_id = %id, frames = meta.frames.len(), "Built encode graph");

        let archive = self.source.fetch_archive(&meta.original_src).await?;

        let workspace = JobWorkspace::new(&id.to_string(), self.settings.work_dir.as_deref())?;
        let frames = load_frames(
            archive,
            meta.frames,
            self.backend.frame_storage(),
            workspace.dir(),
        )
        .await?;

        let output = workspace.output_path();
        self.backend.encode(&frames, &graph, &output).await?;

        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| Error::encode(format!("reading encoded output failed: {e}")))?;
        Ok(Bytes::from(data))
    }
}
