//! Error types for the ingest service.
//!
//! Failures inside per-chunk and per-artifact handling are isolated and
//! logged by their call sites; only the variants surfaced through HTTP
//! handlers are converted to responses here.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Result type for ingest-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    /// Normal, expected condition: no usable metadata record for the stream.
    #[error("Stream not live")]
    NotLive,

    /// The shared metadata store is unreachable or rejected an operation.
    /// Non-fatal for sessions, fatal for the read API.
    #[error("metadata store error: {0}")]
    MetadataStore(String),

    /// The transcoder executable is missing or could not be launched.
    /// Fatal to the owning session only.
    #[error("transcoder spawn failed: {0}")]
    TranscoderSpawn(String),

    /// A single artifact's upload attempt failed. Logged, never fatal;
    /// the next watcher event supersedes it.
    #[error("upload failed for {key}: {reason}")]
    Upload { key: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotLive => StatusCode::NOT_FOUND,
            AppError::MetadataStore(_)
            | AppError::TranscoderSpawn(_)
            | AppError::Upload { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal detail stays in the logs, not on the wire.
        let message = match self {
            AppError::BadRequest(_) | AppError::NotLive => self.to_string(),
            _ => "Internal server error".to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
