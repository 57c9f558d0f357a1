//! Upstream animation sources and archive loading.

pub mod archive;
pub mod pixiv;

use async_trait::async_trait;
use bytes::Bytes;
use ugoiraforge_common::{ArtworkId, Result, UgoiraMeta};

pub use archive::load_frames;
pub use pixiv::PixivClient;

/// Where animation metadata and frame archives come from.
#[async_trait]
pub trait UgoiraSource: Send + Sync {
    /// Fetch frame metadata for an artwork.
    ///
    /// Returns [`ugoiraforge_common::Error::IneligibleSource`] when the
    /// artwork exists but is not an animation, or does not exist at all.
    async fn fetch_metadata(&self, id: ArtworkId) -> Result<UgoiraMeta>;

    /// Download the zip archive holding the frame images.
    async fn fetch_archive(&self, url: &str) -> Result<Bytes>;
}
