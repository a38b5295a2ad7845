//! Blob delivery for videos and thumbnails referenced in chat messages.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use mime::Mime;
use std::sync::Arc;

use super::AppState;
use crate::error::ServiceError;

fn content_type(path: &str) -> Mime {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpeg" | "jpg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("mp4") => "video/mp4"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// GET /media/{*path}
pub async fn media_handler(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ServiceError> {
    let data = state.service.blobs.get(&path).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type(&path).to_string())],
        data,
    )
        .into_response())
}
