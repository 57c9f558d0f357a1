//! pixiv ajax API client.
//!
//! Metadata comes from `GET {api_base}/illust/{id}/ugoira_meta`. pixiv answers
//! unknown or non-animated ids with a 4xx status and a JSON body carrying
//! `error: true`, so client errors are still parsed; only server errors and
//! unreadable bodies count as fetch failures.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;
use ugoiraforge_common::{frames_from_delays, ArtworkId, Error, Result, UgoiraMeta};

use super::UgoiraSource;
use crate::config::PixivConfig;

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    /// An object on success, `[]` on error.
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaBody {
    original_src: String,
    frames: Vec<MetaFrame>,
}

#[derive(Debug, Deserialize)]
struct MetaFrame {
    file: String,
    delay: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`UgoiraSource`] backed by the pixiv web API.
pub struct PixivClient {
    client: Client,
    api_base: String,
    referer: String,
    user_agent: String,
    cookie: String,
}

impl PixivClient {
    pub fn new(config: &PixivConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            referer: config.referer.clone(),
            user_agent: config.user_agent.clone(),
            cookie: config.cookie.clone(),
        }
    }

    fn meta_url(&self, id: ArtworkId) -> String {
        format!("{}/illust/{}/ugoira_meta", self.api_base, id)
    }
}

/// Interpret a metadata reply.
fn parse_meta(id: ArtworkId, raw: &[u8]) -> Result<UgoiraMeta> {
    let response: MetaResponse = serde_json::from_slice(raw)
        .map_err(|e| Error::metadata(format!("unreadable metadata for {id}: {e}")))?;

    if response.error {
        let message = if response.message.is_empty() {
            "metadata reported an error".to_string()
        } else {
            response.message
        };
        return Err(Error::ineligible(id, message));
    }

    let body: MetaBody = serde_json::from_value(response.body)
        .map_err(|e| Error::metadata(format!("incomplete metadata for {id}: {e}")))?;

    Ok(UgoiraMeta {
        original_src: body.original_src,
        frames: frames_from_delays(body.frames.into_iter().map(|f| (f.file, f.delay))),
    })
}

#[async_trait]
impl UgoiraSource for PixivClient {
    async fn fetch_metadata(&self, id: ArtworkId) -> Result<UgoiraMeta> {
        let url = self.meta_url(id);
        debug!(artwork_id = %id, "GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::COOKIE, &self.cookie)
            .send()
            .await
            .map_err(|e| Error::metadata(format!("request for {id} failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::metadata(format!("metadata for {id} returned {status}")));
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| Error::metadata(format!("reading metadata for {id} failed: {e}")))?;
        parse_meta(id, &raw)
    }

    async fn fetch_archive(&self, url: &str) -> Result<Bytes> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::REFERER, &self.referer)
            .send()
            .await
            .map_err(|e| Error::archive(format!("request for {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::archive(format!("{url} returned {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::archive(format!("reading {url} failed: {e}")))
    }
}
