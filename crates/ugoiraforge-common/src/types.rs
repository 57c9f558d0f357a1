//! Core data model: frames, upstream metadata, and conversion jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ArtworkId;

/// One image of an animation and how long it stays on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Position in the animation, contiguous from 0.
    pub sequence_index: usize,
    /// Archive entry name holding the image.
    pub source_file: String,
    /// Display duration in milliseconds.
    pub display_duration_ms: u32,
}

impl Frame {
    pub fn new(sequence_index: usize, source_file: impl Into<String>, display_duration_ms: u32) -> Self {
        Self {
            sequence_index,
            source_file: source_file.into(),
            display_duration_ms,
        }
    }
}

/// Build an ordered frame list from `(file, delay)` pairs, numbering from 0.
pub fn frames_from_delays<I, S>(entries: I) -> Vec<Frame>
where
    I: IntoIterator<Item = (S, u32)>,
    S: Into<String>,
{
    entries
        .into_iter()
        .enumerate()
        .map(|(i, (file, delay))| Frame::new(i, file, delay))
        .collect()
}

/// Animation metadata for an eligible artwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UgoiraMeta {
    /// Location of the full-resolution frame archive.
    pub original_src: String,
    /// Frames in display order.
    pub frames: Vec<Frame>,
}

/// Lifecycle of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    /// Whether the job has left the pipeline.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Book-keeping for one admitted conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    pub id: ArtworkId,
    pub retry_count: u32,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
}

impl ConversionJob {
    pub fn new(id: ArtworkId) -> Self {
        Self {
            id,
            retry_count: 0,
            state: JobState::Pending,
            created_at: Utc::now(),
        }
    }

    /// Total attempts started so far, counting the current one.
    pub fn attempts(&self) -> u32 {
        match self.state {
            JobState::Pending => 0,
            _ => self.retry_count + 1,
        }
    }

    /// Move a pending job to running for its first attempt.
    pub fn start(&mut self) {
        self.state = JobState::Running;
    }

    /// Account for another attempt after a failure.
    ///
    /// Returns `false` without changing anything once `max_retries` retries
    /// have already been spent.
    pub fn retry(&mut self, max_retries: u32) -> bool {
        if self.retry_count >= max_retries {
            return false;
        }
        self.retry_count += 1;
        self.state = JobState::Running;
        true
    }

    pub fn succeed(&mut self) {
        self.state = JobState::Succeeded;
    }

    pub fn fail(&mut self) {
        self.state = JobState::Failed;
    }
}
