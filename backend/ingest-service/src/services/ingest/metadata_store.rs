//! Redis-backed liveness metadata shared with the viewer-facing API.
//!
//! One hash per stream (`stream:{id}`) with fields `url`, `viewers` and
//! `updatedAt`. Writes are per-stream keyed, so concurrent sessions for
//! different identifiers never conflict.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Liveness record as served by `GET /api/stream/{id}`.
///
/// `viewers` counts inbound producer chunks, an approximate activity signal
/// rather than a real audience size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub url: Option<String>,
    pub viewers: i64,
    pub updated_at: Option<String>,
}

/// Capability-scoped client handed to each session at construction.
#[async_trait]
pub trait StreamMetadataStore: Send + Sync {
    /// Seed the record at session start: viewers at a nominal starting value,
    /// no url until the first playlist lands in storage.
    async fn init_record(&self, stream_id: &str) -> Result<()>;

    /// Bump the activity counter for one inbound chunk.
    async fn bump_activity(&self, stream_id: &str) -> Result<i64>;

    /// Record the public playlist URL once it is actually fetchable.
    async fn publish_url(&self, stream_id: &str, url: &str) -> Result<()>;

    /// Terminal policy: keep the record, zero the counter, refresh the stamp.
    async fn mark_ended(&self, stream_id: &str) -> Result<()>;

    async fn fetch(&self, stream_id: &str) -> Result<Option<StreamMetadata>>;
}

#[derive(Clone)]
pub struct RedisMetadataStore {
    redis: ConnectionManager,
}

impl RedisMetadataStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(stream_id: &str) -> String {
        format!("stream:{stream_id}")
    }
}

#[async_trait]
impl StreamMetadataStore for RedisMetadataStore {
    async fn init_record(&self, stream_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let now = Utc::now().to_rfc3339();
        let fields = [("viewers", "1"), ("updatedAt", now.as_str())];
        conn.hset_multiple::<_, _, _, ()>(Self::key(stream_id), &fields)
            .await
            .context("failed to seed stream metadata")?;
        Ok(())
    }

    async fn bump_activity(&self, stream_id: &str) -> Result<i64> {
        let mut conn = self.redis.clone();
        let viewers: i64 = conn
            .hincr(Self::key(stream_id), "viewers", 1)
            .await
            .context("failed to increment viewer count")?;
        Ok(viewers)
    }

    async fn publish_url(&self, stream_id: &str, url: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let now = Utc::now().to_rfc3339();
        let fields = [("url", url), ("updatedAt", now.as_str())];
        conn.hset_multiple::<_, _, _, ()>(Self::key(stream_id), &fields)
            .await
            .context("failed to publish playlist url")?;
        Ok(())
    }

    async fn mark_ended(&self, stream_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let now = Utc::now().to_rfc3339();
        let fields = [("viewers", "0"), ("updatedAt", now.as_str())];
        conn.hset_multiple::<_, _, _, ()>(Self::key(stream_id), &fields)
            .await
            .context("failed to mark stream ended")?;
        Ok(())
    }

    async fn fetch(&self, stream_id: &str) -> Result<Option<StreamMetadata>> {
        let mut conn = self.redis.clone();
        let raw: HashMap<String, String> = conn
            .hgetall(Self::key(stream_id))
            .await
            .context("failed to fetch stream metadata")?;
        Ok(metadata_from_hash(raw))
    }
}

fn metadata_from_hash(mut raw: HashMap<String, String>) -> Option<StreamMetadata> {
    if raw.is_empty() {
        return None;
    }
    let viewers = raw
        .get("viewers")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    Some(StreamMetadata {
        url: raw.remove("url"),
        viewers,
        updated_at: raw.remove("updatedAt"),
    })
}
