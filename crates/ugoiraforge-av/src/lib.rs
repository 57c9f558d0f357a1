//! # ugoiraforge-av
//!
//! Turns an ordered list of timed frames into an H.264 MP4.
//!
//! This crate provides:
//! - [`EncodeGraph`]: the variable-frame-duration graph built from frame delays
//! - [`EncodingBackend`]: the executor abstraction, with an external `ffmpeg`
//!   variant and an in-process variant over a virtual filesystem
//! - [`JobWorkspace`]: per-job scratch directories
//! - ffmpeg discovery and a subprocess runner that forwards output to `tracing`
//!
//! ## Features
//!
//! - `libav` - In-process encoding through libavcodec (`ffmpeg-the-third`)
//!
//! ## Example
//!
//! ```no_run
//! use ugoiraforge_av::{select_backend, BackendOptions, EncodeGraph};
//! use ugoiraforge_common::frames_from_delays;
//!
//! let backend = select_backend(&BackendOptions::default())?;
//! let graph = EncodeGraph::build(&frames_from_delays([("000000.jpg", 100)]))?;
//! println!("{} via {}", graph.filter_complex(), backend.name());
//! # Ok::<(), ugoiraforge_common::Error>(())
//! ```

pub mod backend;
pub mod command;
pub mod graph;
pub mod tools;
pub mod workspace;

// Re-exports
pub use backend::{
    select_backend, BackendKind, BackendOptions, EmbeddedBackend, EmbeddedRuntime,
    EncodingBackend, FrameData, FrameSet, FrameStorage, ProcessBackend, VirtualFs,
};
#[cfg(feature = "libav")]
pub use backend::LibavRuntime;
pub use command::{ToolCommand, ToolOutput};
pub use graph::{Directive, EncodeGraph, Pad, TimelineEntry};
pub use tools::{check_ffmpeg, locate_ffmpeg, ToolInfo};
pub use workspace::JobWorkspace;
