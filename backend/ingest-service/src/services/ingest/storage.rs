//! Object-storage backends for published HLS artifacts.
//!
//! Storage is a capability passed to the publisher at construction so tests
//! can substitute an in-memory fake for the S3 client.

use crate::config::S3Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a local file under `key`, replacing any existing object.
    async fn put_file(
        &self,
        key: &str,
        local_path: &Path,
        content_type: &str,
        cache_control: &str,
    ) -> Result<()>;

    /// Public URL a viewer can fetch the object from.
    fn public_url(&self, key: &str) -> String;
}

/// S3 (or S3-compatible) storage client.
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStorage {
    /// Build an S3 client from configuration.
    ///
    /// Credentials fall back to the default provider chain when not set
    /// explicitly; a custom endpoint supports MinIO and friends.
    pub async fn from_config(cfg: &S3Config) -> Self {
        use aws_sdk_s3::config::Region;

        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&cfg.access_key_id, &cfg.secret_access_key)
        {
            use aws_sdk_s3::config::Credentials;

            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "ingest_service_s3",
            );
            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &cfg.endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        let client = Client::new(&aws_config);

        let public_base_url = cfg.public_base_url.clone().unwrap_or_else(|| {
            format!("https://{}.s3.{}.amazonaws.com", cfg.bucket, cfg.region)
        });

        tracing::info!(bucket = %cfg.bucket, region = %cfg.region, "S3 storage client initialized");

        Self {
            client,
            bucket: cfg.bucket.clone(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_file(
        &self,
        key: &str,
        local_path: &Path,
        content_type: &str,
        cache_control: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("failed to read {}", local_path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .cache_control(cache_control)
            .send()
            .await
            .map_err(|e| {
                let error_msg = e.to_string();
                if error_msg.contains("403") || error_msg.contains("Forbidden") {
                    anyhow!("S3 auth failed (403): check AWS credentials")
                } else if error_msg.contains("NoSuchBucket") {
                    anyhow!("S3 bucket not found: {}", self.bucket)
                } else {
                    anyhow!("S3 upload failed: {e}")
                }
            })?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
