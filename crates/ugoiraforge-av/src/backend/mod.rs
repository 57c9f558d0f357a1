//! Encoding backends.
//!
//! An [`EncodingBackend`] runs an [`EncodeGraph`] over a job's frames and
//! writes an MP4 to the requested path. Two variants exist:
//!
//! - [`ProcessBackend`] runs an external `ffmpeg` over frames extracted into
//!   the job's workspace directory.
//! - [`EmbeddedBackend`] keeps frames in an in-process virtual filesystem and
//!   hands the graph to an [`EmbeddedRuntime`].
//!
//! One backend is chosen at startup by [`select_backend`] and shared by every
//! job as `Arc<dyn EncodingBackend>`.

mod embedded;
#[cfg(feature = "libav")]
mod libav;
mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ugoiraforge_common::{Error, Frame, Result};

use crate::graph::EncodeGraph;
use crate::tools;

pub use embedded::{EmbeddedBackend, EmbeddedRuntime, VirtualFs};
#[cfg(feature = "libav")]
pub use libav::LibavRuntime;
pub use process::ProcessBackend;

/// Where a backend expects the archive loader to put frame images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStorage {
    /// Keep image bytes in memory.
    Memory,
    /// Write images into the job's workspace directory.
    Directory,
}

/// Image data for a job's frames.
#[derive(Debug, Clone)]
pub enum FrameData {
    /// One buffer per frame, in frame order.
    Memory(Vec<Bytes>),
    /// Directory holding one file per frame, named after its archive entry.
    Directory(PathBuf),
}

/// A job's frames together with their image data.
#[derive(Debug, Clone)]
pub struct FrameSet {
    frames: Vec<Frame>,
    data: FrameData,
}

impl FrameSet {
    /// Pair frames with their image data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when in-memory data does not have one
    /// buffer per frame.
    pub fn new(frames: Vec<Frame>, data: FrameData) -> Result<Self> {
        if let FrameData::Memory(buffers) = &data {
            if buffers.len() != frames.len() {
                return Err(Error::invalid_input(format!(
                    "{} frames but {} image buffers",
                    frames.len(),
                    buffers.len()
                )));
            }
        }
        Ok(Self { frames, data })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn data(&self) -> &FrameData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// In-memory image for the frame stored under `file`.
    pub fn bytes_for(&self, file: &str) -> Option<&Bytes> {
        let FrameData::Memory(buffers) = &self.data else {
            return None;
        };
        self.frames
            .iter()
            .position(|f| f.source_file == file)
            .and_then(|i| buffers.get(i))
    }
}

/// Executes encode graphs.
#[async_trait]
pub trait EncodingBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// How this backend wants frames materialized.
    fn frame_storage(&self) -> FrameStorage;

    /// Encode `frames` through `graph` into an MP4 at `output`.
    ///
    /// Temporary files or virtual files created for the job are removed
    /// whether or not the encode succeeds.
    async fn encode(&self, frames: &FrameSet, graph: &EncodeGraph, output: &Path) -> Result<()>;
}

/// Which backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// External ffmpeg when found, otherwise the in-process runtime.
    #[default]
    Auto,
    /// External ffmpeg subprocess.
    Process,
    /// In-process runtime (requires the `libav` feature).
    Embedded,
}

/// Options for [`select_backend`].
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub kind: BackendKind,
    /// Configured ffmpeg location; `PATH` is searched when unset or missing.
    pub ffmpeg_path: Option<PathBuf>,
    pub video_codec: String,
    pub timeout: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            kind: BackendKind::Auto,
            ffmpeg_path: None,
            video_codec: "libx264".to_string(),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Choose the encoding backend once, at startup.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] when the requested backend cannot run in
/// this environment.
pub fn select_backend(options: &BackendOptions) -> Result<Arc<dyn EncodingBackend>> {
    let ffmpeg = tools::locate_ffmpeg(options.ffmpeg_path.as_deref());

    match (options.kind, ffmpeg) {
        (BackendKind::Process | BackendKind::Auto, Some(path)) => {
            tracing::info!("Using external ffmpeg at {:?}", path);
            Ok(Arc::new(ProcessBackend::new(
                path,
                options.video_codec.clone(),
                options.timeout,
            )))
        }
        (BackendKind::Process, None) => Err(Error::tool_not_found(tools::FFMPEG)),
        (BackendKind::Embedded | BackendKind::Auto, _) => embedded_backend(options),
    }
}

#[cfg(feature = "libav")]
fn embedded_backend(options: &BackendOptions) -> Result<Arc<dyn EncodingBackend>> {
    tracing::info!("Using in-process libav runtime");
    let runtime = LibavRuntime::new(options.video_codec.clone())?;
    Ok(Arc::new(EmbeddedBackend::new(Arc::new(runtime))))
}

#[cfg(not(feature = "libav"))]
fn embedded_backend(_options: &BackendOptions) -> Result<Arc<dyn EncodingBackend>> {
    Err(Error::tool_not_found(
        "ffmpeg (no external binary found and the in-process runtime is not compiled in; \
         rebuild with --features libav)",
    ))
}
