//! Stream ingest pipeline: session lifecycle, transcoder supervision,
//! output watching, artifact publication and shared liveness metadata.

pub mod metadata_store;
pub mod publisher;
pub mod session;
pub mod storage;
pub mod transcoder;
pub mod watcher;

pub use metadata_store::{RedisMetadataStore, StreamMetadata, StreamMetadataStore};
pub use publisher::{
    content_type_for, object_key, ArtifactPublisher, HLS_PLAYLIST_CONTENT_TYPE,
    TRANSPORT_STREAM_CONTENT_TYPE,
};
pub use session::IngestSession;
pub use storage::{ObjectStorage, S3ObjectStorage};
pub use transcoder::{
    FfmpegTranscoder, SpawnedTranscoder, Transcoder, TranscoderExit, TranscoderInput,
    PLAYLIST_FILENAME, SEGMENT_FILENAME_TEMPLATE,
};
pub use watcher::{SegmentEvent, SegmentWatcher};
