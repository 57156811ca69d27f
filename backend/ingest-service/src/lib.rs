pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod services;

pub use error::{AppError, Result};

use services::ingest::{ArtifactPublisher, StreamMetadataStore, Transcoder};
use std::sync::Arc;

/// Shared application state.
///
/// The metadata store, publisher and transcoder are capability-scoped
/// handles injected at construction, so sessions stay independent of any
/// concrete backend and tests can substitute fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub metadata: Arc<dyn StreamMetadataStore>,
    pub publisher: Arc<ArtifactPublisher>,
    pub transcoder: Arc<dyn Transcoder>,
}
