//! Conversion endpoints.
//!
//! `GET /convert/{id}.mp4` (and the older `/ugoira2mp4/{id}.mp4`) answers with
//! the MP4 on success and the fixed failure page otherwise.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use ugoiraforge_common::ArtworkId;

use super::error::ConvertError;
use super::AppContext;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/convert/{file}", get(convert))
        .route("/ugoira2mp4/{file}", get(convert))
}

/// Parse `<digits>.mp4` into an id.
fn parse_target(file: &str) -> Option<ArtworkId> {
    file.strip_suffix(".mp4")?.parse().ok()
}

async fn convert(State(ctx): State<AppContext>, Path(file): Path<String>) -> Response {
    let Some(id) = parse_target(&file) else {
        return (
            StatusCode::BAD_REQUEST,
            "Expected a numeric artwork id followed by .mp4",
        )
            .into_response();
    };

    match ctx.scheduler.submit(id).await {
        Ok(data) => ([(header::CONTENT_TYPE, "video/mp4")], data).into_response(),
        Err(e) => ConvertError::new(id, e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing() {
        assert_eq!(parse_target("12345678.mp4"), Some(ArtworkId::new(12345678)));
        assert_eq!(parse_target("0042.mp4"), Some(ArtworkId::new(42)));
        assert_eq!(parse_target("12345678"), None);
        assert_eq!(parse_target("abc.mp4"), None);
        assert_eq!(parse_target(".mp4"), None);
        assert_eq!(parse_target("12.gif"), None);
    }
}
