//! Error types shared by every stage of the conversion pipeline.
//!
//! The variants mirror the failure kinds the scheduler distinguishes: an
//! ineligible source is terminal, upstream and encode failures are retried,
//! and an exhausted retry budget is what finally reaches the caller.

use crate::ArtworkId;

/// Common error type for ugoiraforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The upstream metadata says the id has no convertible animation.
    #[error("Artwork {id} is not an eligible source: {message}")]
    IneligibleSource { id: ArtworkId, message: String },

    /// Fetching or decoding the animation metadata failed.
    #[error("Metadata fetch failed: {0}")]
    MetadataFetch(String),

    /// Downloading or unpacking the frame archive failed.
    #[error("Archive download failed: {0}")]
    ArchiveDownload(String),

    /// The encoding backend rejected the job or failed while running it.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Every allowed attempt for the job failed.
    #[error("Conversion of {id} failed after {attempts} attempts")]
    RetryBudgetExhausted { id: ArtworkId, attempts: u32 },

    /// A required external tool could not be located.
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// An external tool ran but failed.
    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new IneligibleSource error.
    pub fn ineligible<S: Into<String>>(id: ArtworkId, msg: S) -> Self {
        Self::IneligibleSource {
            id,
            message: msg.into(),
        }
    }

    /// Create a new MetadataFetch error.
    pub fn metadata<S: Into<String>>(msg: S) -> Self {
        Self::MetadataFetch(msg.into())
    }

    /// Create a new ArchiveDownload error.
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::ArchiveDownload(msg.into())
    }

    /// Create a new Encode error.
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new ToolNotFound error.
    pub fn tool_not_found<S: Into<String>>(tool: S) -> Self {
        Self::ToolNotFound(tool.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether another attempt at the same job could succeed.
    ///
    /// Only transient upstream, archive, and encode failures qualify. An
    /// ineligible source or malformed input will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MetadataFetch(_)
                | Self::ArchiveDownload(_)
                | Self::Encode(_)
                | Self::Tool { .. }
                | Self::Io(_)
        )
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
