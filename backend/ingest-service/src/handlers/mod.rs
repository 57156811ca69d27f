//! HTTP handlers for the ingest service:
//! - WebSocket ingest gateway for producers
//! - stream metadata lookups for viewers

pub mod ingest;
pub mod streams;

pub use ingest::ingest_ws;
pub use streams::{get_stream, health};
