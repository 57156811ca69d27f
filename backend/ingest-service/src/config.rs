//! Configuration management for the ingest service.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub hls: HlsConfig,
    pub cache: CacheConfig,
    pub s3: S3Config,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HlsConfig {
    /// Root directory under which each stream gets a private output directory.
    pub root_dir: PathBuf,
    /// Transcoder executable; the argument contract is fixed, the binary is not.
    pub ffmpeg_path: String,
    /// Output-directory scan interval for the segment watcher.
    pub watch_poll_ms: u64,
    /// Bounded grace period for trailing segment flushes after disconnect.
    pub drain_grace_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible storage like MinIO.
    pub endpoint: Option<String>,
    /// Overrides the derived virtual-hosted bucket URL in published playlist URLs.
    pub public_base_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: std::env::var("INGEST_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("INGEST_SERVICE_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
            },
            hls: HlsConfig {
                root_dir: std::env::var("HLS_ROOT_DIR")
                    .unwrap_or_else(|_| "./hls".to_string())
                    .into(),
                ffmpeg_path: std::env::var("FFMPEG_PATH")
                    .unwrap_or_else(|_| "ffmpeg".to_string()),
                watch_poll_ms: std::env::var("HLS_WATCH_POLL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(250),
                drain_grace_ms: std::env::var("HLS_DRAIN_GRACE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            },
            cache: CacheConfig {
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost".to_string()),
            },
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "live-hls".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                public_base_url: std::env::var("S3_PUBLIC_BASE_URL").ok(),
            },
        }
    }
}
