//! External-process encoding through an `ffmpeg` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ugoiraforge_common::{Error, Result};

use super::{EncodingBackend, FrameData, FrameSet, FrameStorage};
use crate::command::ToolCommand;
use crate::graph::EncodeGraph;

/// Runs the encode graph with an external ffmpeg.
///
/// Frames must already sit on disk in one directory, named after their
/// archive entries. The output is written straight to the target path and the
/// exit status decides success.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    ffmpeg: PathBuf,
    video_codec: String,
    timeout: Duration,
}

impl ProcessBackend {
    pub fn new(ffmpeg: PathBuf, video_codec: String, timeout: Duration) -> Self {
        Self {
            ffmpeg,
            video_codec,
            timeout,
        }
    }

    /// Arguments passed to ffmpeg for a graph whose frames live in `dir`.
    pub fn command_args(&self, graph: &EncodeGraph, dir: &Path, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        args.extend(graph.ffmpeg_args(
            |file| dir.join(file).to_string_lossy().into_owned(),
            &self.video_codec,
            &output.to_string_lossy(),
        ));
        args
    }
}

#[async_trait]
impl EncodingBackend for ProcessBackend {
    fn name(&self) -> &'static str {
        "process"
    }

    fn frame_storage(&self) -> FrameStorage {
        FrameStorage::Directory
    }

    async fn encode(&self, frames: &FrameSet, graph: &EncodeGraph, output: &Path) -> Result<()> {
        let FrameData::Directory(dir) = frames.data() else {
            return Err(Error::encode("external encoder needs frames on disk"));
        };

        let args = self.command_args(graph, dir, output);
        tracing::debug!("FFmpeg args: {:?}", args);

        ToolCommand::new(self.ffmpeg.clone())
            .args(args)
            .timeout(self.timeout)
            .execute()
            .await
            .map_err(|e| Error::encode(e.to_string()))?;

        if !output.exists() {
            return Err(Error::encode(format!(
                "ffmpeg reported success but wrote no output at {:?}",
                output
            )));
        }
        Ok(())
    }
}
