use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use ugoiraforge_av::{BackendKind, BackendOptions};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pixiv: PixivConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream pixiv access.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PixivConfig {
    /// Base of the ajax API, without a trailing slash
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Referer sent with archive downloads (the image host rejects requests without one)
    #[serde(default = "default_referer")]
    pub referer: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Session cookie, e.g. `PHPSESSID=...`; R-18 works need a logged-in session
    #[serde(default)]
    pub cookie: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://www.pixiv.net/ajax".to_string()
}

fn default_referer() -> String {
    "https://www.pixiv.net/".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for PixivConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            referer: default_referer(),
            user_agent: default_user_agent(),
            cookie: String::new(),
            timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    #[default]
    Auto,
    Process,
    Embedded,
}

impl From<BackendChoice> for BackendKind {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Auto => BackendKind::Auto,
            BackendChoice::Process => BackendKind::Process,
            BackendChoice::Embedded => BackendKind::Embedded,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderConfig {
    #[serde(default)]
    pub backend: BackendChoice,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Maximum runtime of one external encode, in seconds
    #[serde(default = "default_encode_timeout")]
    pub timeout_secs: u64,

    /// Root for per-job scratch directories (system temp dir when unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_encode_timeout() -> u64 {
    600
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            video_codec: default_video_codec(),
            timeout_secs: default_encode_timeout(),
            work_dir: None,
        }
    }
}

impl Config {
    /// Backend selection options from the `[encoder]` and `[tools]` sections.
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            kind: self.encoder.backend.into(),
            ffmpeg_path: self.tools.ffmpeg_path.clone(),
            video_codec: self.encoder.video_codec.clone(),
            timeout: Duration::from_secs(self.encoder.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Jobs allowed to run at once
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between attempts, in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_concurrency_limit() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    2000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    #[default]
    Memory,
    Disk,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub mode: CacheMode,

    /// Number of finished videos kept
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Directory for the disk cache
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_cache_capacity() -> usize {
    4
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Memory,
            capacity: default_cache_capacity(),
            dir: default_cache_dir(),
        }
    }
}
