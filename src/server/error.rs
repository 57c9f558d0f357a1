//! Conversion failures as HTTP responses.
//!
//! Clients only ever see one failure page. The specific cause is logged
//! server-side and never exposed.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use ugoiraforge_common::{ArtworkId, Error};

/// Body returned for every failed conversion.
pub const FAILURE_PAGE: &str = "<!DOCTYPE html><head></head><body><pre><html></html>Convert Failure.\n\n\
Reason:\n\
1. Requested artwork ID is not a ugoira or not existed.\n\
2. Target file is too large.\n\
3. Invalid or expired cookie.</pre></body></html>";

/// A failed conversion request.
pub struct ConvertError {
    id: ArtworkId,
    inner: Error,
}

impl ConvertError {
    pub fn new(id: ArtworkId, inner: Error) -> Self {
        Self { id, inner }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        tracing::warn!(
            artwork_id = %self.id,
            error = %self.inner,
            "Conversion request failed"
        );

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            FAILURE_PAGE,
        )
            .into_response()
    }
}
