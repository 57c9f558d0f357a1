//! In-process encoding over a virtual filesystem.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use ugoiraforge_common::{Error, Result};

use super::{EncodingBackend, FrameData, FrameSet, FrameStorage};
use crate::graph::EncodeGraph;

/// Flat in-memory filesystem shared by the embedded runtime.
///
/// Paths are plain strings. Each encode works under its own directory-like
/// prefix so concurrent jobs cannot see each other's files.
#[derive(Debug, Default)]
pub struct VirtualFs {
    files: RwLock<HashMap<String, Bytes>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, path: impl Into<String>, data: Bytes) {
        self.files.write().insert(path.into(), data);
    }

    pub fn read(&self, path: &str) -> Option<Bytes> {
        self.files.read().get(path).cloned()
    }

    /// Remove every file under `prefix/`, returning how many were removed.
    pub fn remove_dir(&self, prefix: &str) -> usize {
        let dir = format!("{prefix}/");
        let mut files = self.files.write();
        let before = files.len();
        files.retain(|path, _| !path.starts_with(&dir));
        before - files.len()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

/// An encoder that runs inside this process.
///
/// `inputs` are virtual paths in graph input order; the runtime must write
/// the finished MP4 to the virtual path `output`. Runtimes are blocking and
/// are called from a blocking thread.
pub trait EmbeddedRuntime: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, fs: &VirtualFs, graph: &EncodeGraph, inputs: &[String], output: &str) -> Result<()>;
}

/// Removes a job's virtual directory on drop.
struct Scope {
    fs: Arc<VirtualFs>,
    dir: String,
}

impl Drop for Scope {
    fn drop(&mut self) {
        let removed = self.fs.remove_dir(&self.dir);
        tracing::trace!(dir = %self.dir, removed, "Cleared virtual job directory");
    }
}

/// Encodes through an [`EmbeddedRuntime`] with frames held in a [`VirtualFs`].
pub struct EmbeddedBackend {
    runtime: Arc<dyn EmbeddedRuntime>,
    fs: Arc<VirtualFs>,
    next_job: AtomicU64,
}

impl EmbeddedBackend {
    pub fn new(runtime: Arc<dyn EmbeddedRuntime>) -> Self {
        Self::with_fs(runtime, Arc::new(VirtualFs::new()))
    }

    /// Use an existing virtual filesystem.
    pub fn with_fs(runtime: Arc<dyn EmbeddedRuntime>, fs: Arc<VirtualFs>) -> Self {
        Self {
            runtime,
            fs,
            next_job: AtomicU64::new(0),
        }
    }

    pub fn fs(&self) -> &Arc<VirtualFs> {
        &self.fs
    }
}

#[async_trait]
impl EncodingBackend for EmbeddedBackend {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn frame_storage(&self) -> FrameStorage {
        FrameStorage::Memory
    }

    async fn encode(&self, frames: &FrameSet, graph: &EncodeGraph, output: &Path) -> Result<()> {
        if !matches!(frames.data(), FrameData::Memory(_)) {
            return Err(Error::encode("embedded runtime needs frames in memory"));
        }

        let scope = Scope {
            fs: Arc::clone(&self.fs),
            dir: format!("job{}", self.next_job.fetch_add(1, Ordering::Relaxed)),
        };

        let mut inputs = Vec::with_capacity(graph.inputs().len());
        for file in graph.inputs() {
            let data = frames
                .bytes_for(file)
                .ok_or_else(|| Error::encode(format!("no image data for input {file}")))?;
            let path = format!("{}/{}", scope.dir, file);
            self.fs.write(path.clone(), data.clone());
            inputs.push(path);
        }
        let out_path = format!("{}/output.mp4", scope.dir);

        tracing::debug!(runtime = self.runtime.name(), inputs = inputs.len(), "Running embedded encode");

        // The scope moves into the blocking task so the job directory is
        // cleared after the runtime returns, even if this future is dropped.
        let runtime = Arc::clone(&self.runtime);
        let job_graph = graph.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            runtime.run(&scope.fs, &job_graph, &inputs, &out_path)?;
            scope
                .fs
                .read(&out_path)
                .ok_or_else(|| Error::encode("embedded runtime produced no output"))
        })
        .await
        .map_err(|e| Error::encode(format!("embedded runtime panicked: {e}")))??;

        tokio::fs::write(output, &encoded).await?;
        Ok(())
    }
}
