//! Ugoiraforge-Common: Shared types, identifiers, and errors.
//!
//! This crate provides the vocabulary used across ugoiraforge:
//!
//! - **Typed IDs**: [`ArtworkId`], a normalized numeric artwork identifier
//! - **Core Types**: frames, upstream metadata, and conversion job state
//! - **Error Handling**: the pipeline error kinds and a result alias
//!
//! # Examples
//!
//! ```
//! use ugoiraforge_common::{ArtworkId, Error, Frame, Result};
//!
//! let id: ArtworkId = "0012345678".parse().unwrap();
//! assert_eq!(id.to_string(), "12345678");
//!
//! let frame = Frame::new(0, "000000.jpg", 100);
//! assert_eq!(frame.display_duration_ms, 100);
//!
//! fn example() -> Result<()> {
//!     Err(Error::encode("no frames"))
//! }
//! assert!(example().unwrap_err().is_retryable());
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
