use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::info;

use ingest_service::config::Config;
use ingest_service::services::ingest::{
    ArtifactPublisher, FfmpegTranscoder, RedisMetadataStore, S3ObjectStorage,
    StreamMetadataStore, Transcoder,
};
use ingest_service::{handlers, metrics, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .init();

    let config = Config::from_env();

    std::fs::create_dir_all(&config.hls.root_dir).with_context(|| {
        format!(
            "failed to create HLS root directory {}",
            config.hls.root_dir.display()
        )
    })?;

    let redis_client =
        redis::Client::open(config.cache.redis_url.clone()).context("invalid REDIS_URL")?;
    let redis = ConnectionManager::new(redis_client)
        .await
        .context("failed to connect to Redis")?;
    let metadata: Arc<dyn StreamMetadataStore> = Arc::new(RedisMetadataStore::new(redis));

    let storage = Arc::new(S3ObjectStorage::from_config(&config.s3).await);
    let publisher = Arc::new(ArtifactPublisher::new(storage));
    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::new(config.hls.ffmpeg_path.clone()));

    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    info!(%bind_addr, "starting ingest service");

    let state = AppState {
        config,
        metadata,
        publisher,
        transcoder,
    };

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route("/api/stream/{stream_id}", web::get().to(handlers::get_stream))
            .route("/ingest/{stream_id}", web::get().to(handlers::ingest_ws))
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind on {bind_addr}"))?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}
