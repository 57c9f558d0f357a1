//! ugoiraforge - pixiv ugoira to MP4 conversion service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod cache;
pub mod config;
pub mod conversion;
pub mod server;
pub mod source;
