//! Viewer-facing metadata API.

use actix_web::{web, HttpResponse};
use tracing::error;

use crate::error::AppError;
use crate::AppState;

/// `GET /api/stream/{stream_id}`
///
/// Returns `{url, viewers, updatedAt}` for a live stream. A missing record,
/// or one that has not published a playlist yet, is the normal "not live"
/// case and maps to 404; only a store failure is a server error.
pub async fn get_stream(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let stream_id = path.into_inner();

    let record = state.metadata.fetch(&stream_id).await.map_err(|err| {
        error!(%stream_id, error = %err, "metadata lookup failed");
        AppError::MetadataStore(err.to_string())
    })?;

    match record {
        Some(meta) if meta.url.is_some() => Ok(HttpResponse::Ok().json(meta)),
        _ => Err(AppError::NotLive),
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}
