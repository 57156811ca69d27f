//! Artifact publisher: republishes local HLS output to object storage.
//!
//! Keys follow `hls/{stream_id}/{filename}`. Uploads for different artifacts
//! run concurrently; uploads for the same artifact are serialized through a
//! per-key gate so the last disk write is the one that lands in storage.

use super::storage::ObjectStorage;
use super::transcoder::PLAYLIST_FILENAME;
use crate::error::AppError;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const HLS_PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const TRANSPORT_STREAM_CONTENT_TYPE: &str = "video/MP2T";

pub struct ArtifactPublisher {
    storage: Arc<dyn ObjectStorage>,
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl ArtifactPublisher {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            storage,
            gates: DashMap::new(),
        }
    }

    /// Upload one artifact. The file is opened only after the per-key gate is
    /// acquired, so a queued re-upload always ships the newest disk content.
    pub async fn publish(
        &self,
        stream_id: &str,
        filename: &str,
        local_path: &Path,
    ) -> Result<String, AppError> {
        let key = object_key(stream_id, filename);
        let gate = self
            .gates
            .entry(key.clone())
            .or_insert_with(Default::default)
            .clone();
        let _in_flight = gate.lock().await;

        self.storage
            .put_file(
                &key,
                local_path,
                content_type_for(filename),
                cache_control_for(filename),
            )
            .await
            .map_err(|e| AppError::Upload {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        debug!(%key, "uploaded artifact");
        Ok(key)
    }

    /// Public URL of the stream's rolling playlist.
    pub fn playlist_url(&self, stream_id: &str) -> String {
        self.storage
            .public_url(&object_key(stream_id, PLAYLIST_FILENAME))
    }

    /// Drop the upload gates of an ended stream.
    pub fn forget_stream(&self, stream_id: &str) {
        let prefix = format!("hls/{stream_id}/");
        self.gates.retain(|key, _| !key.starts_with(&prefix));
    }
}

pub fn object_key(stream_id: &str, filename: &str) -> String {
    format!("hls/{stream_id}/{filename}")
}

pub fn content_type_for(filename: &str) -> &'static str {
    if filename.ends_with(".m3u8") {
        HLS_PLAYLIST_CONTENT_TYPE
    } else if filename.ends_with(".ts") {
        TRANSPORT_STREAM_CONTENT_TYPE
    } else {
        "application/octet-stream"
    }
}

fn cache_control_for(filename: &str) -> &'static str {
    // The playlist mutates in place; segments are written once.
    if filename.ends_with(".m3u8") {
        "no-cache"
    } else {
        "max-age=31536000"
    }
}
