//! WebSocket ingest gateway.
//!
//! Accepts the producer's upgrade request on `/ingest/{stream_id}` and hands
//! the connection to a fresh [`IngestSession`]. The gateway itself holds no
//! per-stream state, so one instance serves any number of concurrent
//! sessions.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tracing::info;

use crate::error::AppError;
use crate::services::ingest::IngestSession;
use crate::AppState;

/// Media chunks from recorders routinely exceed the default 64 KiB frame cap.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub async fn ingest_ws(
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let stream_id = path.into_inner();
    if !is_valid_stream_id(&stream_id) {
        return Err(AppError::BadRequest(
            "stream id must be non-empty, at most 64 chars, [A-Za-z0-9_-]".into(),
        )
        .into());
    }

    info!(%stream_id, "producer connecting");

    let session = IngestSession::new(&stream_id, &state);
    ws::WsResponseBuilder::new(session, &req, payload)
        .frame_size(MAX_FRAME_BYTES)
        .start()
}

/// Stream identifiers name directories and storage prefixes, so they must be
/// filesystem-safe.
pub(crate) fn is_valid_stream_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
