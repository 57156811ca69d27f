//! Session lifecycle tests over a real WebSocket connection, with the
//! transcoder, object storage and metadata store replaced by fakes.

use awc::{ws, Client};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};

use super::support::{self, FakeTranscoder, MemoryMetadataStore, RecordingStorage};

#[actix_rt::test]
async fn end_to_end_publishes_artifacts_and_metadata() {
    let root = tempfile::tempdir().expect("tempdir");
    let storage = RecordingStorage::new();
    let store = MemoryMetadataStore::new();
    let state = support::test_state(
        root.path(),
        FakeTranscoder::flush_on_write(),
        storage.clone(),
        store.clone(),
    );
    let (addr, handle) = support::start_server(state).await.expect("start server");

    let client = Client::new();
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ingest/abc123"))
        .connect()
        .await
        .expect("connect producer");

    connection
        .send(ws::Message::Binary(Bytes::from_static(b"\x47container-bytes")))
        .await
        .expect("send chunk");

    support::wait_until("metadata record seeded", || store.viewers("abc123") >= 1).await;
    support::wait_until("artifacts uploaded", || {
        storage.contains("hls/abc123/stream.m3u8") && storage.contains("hls/abc123/segment_000.ts")
    })
    .await;
    support::wait_until("playlist url recorded", || {
        store.url("abc123").as_deref() == Some("https://cdn.test/hls/abc123/stream.m3u8")
    })
    .await;

    let playlist = storage.object("hls/abc123/stream.m3u8").expect("playlist");
    assert!(String::from_utf8(playlist)
        .expect("utf8 playlist")
        .contains("segment_000.ts"));

    connection
        .send(ws::Message::Close(None))
        .await
        .expect("close producer");
    drop(connection);

    support::wait_until("output directory removed", || {
        !root.path().join("abc123").exists()
    })
    .await;
    support::wait_until("viewers reset on teardown", || store.viewers("abc123") == 0).await;
    // Terminal policy keeps the record and its url.
    assert!(store.url("abc123").is_some());

    handle.stop(true).await;
}

#[actix_rt::test]
async fn metadata_is_seeded_before_any_artifact_exists() {
    let root = tempfile::tempdir().expect("tempdir");
    let storage = RecordingStorage::new();
    let store = MemoryMetadataStore::new();
    let state = support::test_state(
        root.path(),
        FakeTranscoder::never_flush(),
        storage.clone(),
        store.clone(),
    );
    let (addr, handle) = support::start_server(state).await.expect("start server");

    let client = Client::new();
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ingest/pre-flush"))
        .connect()
        .await
        .expect("connect producer");

    connection
        .send(ws::Message::Binary(Bytes::from_static(b"chunk")))
        .await
        .expect("send chunk");

    support::wait_until("record exists", || store.has_record("pre-flush")).await;
    support::wait_until("activity counted", || store.viewers("pre-flush") >= 1).await;
    assert!(store.url("pre-flush").is_none());
    assert!(storage.is_empty());

    connection.send(ws::Message::Close(None)).await.ok();
    handle.stop(true).await;
}

#[actix_rt::test]
async fn rapid_disconnect_terminates_cleanly() {
    let root = tempfile::tempdir().expect("tempdir");
    let storage = RecordingStorage::new();
    let store = MemoryMetadataStore::new();
    let state = support::test_state(
        root.path(),
        FakeTranscoder::never_flush(),
        storage.clone(),
        store.clone(),
    );
    let (addr, handle) = support::start_server(state).await.expect("start server");

    let client = Client::new();
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ingest/blink"))
        .connect()
        .await
        .expect("connect producer");
    connection
        .send(ws::Message::Close(None))
        .await
        .expect("close immediately");
    drop(connection);

    support::wait_until("output directory removed", || {
        !root.path().join("blink").exists()
    })
    .await;

    // The gateway survives the session: the read API still answers.
    let mut resp = client
        .get(format!("http://{addr}/api/stream/blink"))
        .send()
        .await
        .expect("metadata request");
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "Stream not live");

    handle.stop(true).await;
}

#[actix_rt::test]
async fn one_failed_upload_does_not_block_the_rest() {
    let root = tempfile::tempdir().expect("tempdir");
    let storage = RecordingStorage::failing_for(&["hls/abc123/segment_000.ts"]);
    let store = MemoryMetadataStore::new();
    let state = support::test_state(
        root.path(),
        FakeTranscoder::flush_on_write(),
        storage.clone(),
        store.clone(),
    );
    let (addr, handle) = support::start_server(state).await.expect("start server");

    let client = Client::new();
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ingest/abc123"))
        .connect()
        .await
        .expect("connect producer");

    connection
        .send(ws::Message::Binary(Bytes::from_static(b"first")))
        .await
        .expect("send first chunk");
    connection
        .send(ws::Message::Binary(Bytes::from_static(b"second")))
        .await
        .expect("send second chunk");

    support::wait_until("later artifacts uploaded", || {
        storage.contains("hls/abc123/segment_001.ts") && storage.contains("hls/abc123/stream.m3u8")
    })
    .await;
    assert!(!storage.contains("hls/abc123/segment_000.ts"));

    connection.send(ws::Message::Close(None)).await.ok();
    handle.stop(true).await;
}

#[actix_rt::test]
async fn transcoder_spawn_failure_closes_the_session() {
    let root = tempfile::tempdir().expect("tempdir");
    let storage = RecordingStorage::new();
    let store = MemoryMetadataStore::new();
    let state = support::test_state(
        root.path(),
        FakeTranscoder::failing(),
        storage.clone(),
        store.clone(),
    );
    let (addr, handle) = support::start_server(state).await.expect("start server");

    let client = Client::new();
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ingest/doomed"))
        .connect()
        .await
        .expect("handshake still succeeds");

    let frame = connection.next().await.expect("frame").expect("frame data");
    assert!(matches!(frame, ws::Frame::Close(_)));

    support::wait_until("output directory removed", || {
        !root.path().join("doomed").exists()
    })
    .await;
    assert!(storage.is_empty());

    handle.stop(true).await;
}

#[actix_rt::test]
async fn draining_captures_segments_flushed_after_disconnect() {
    let root = tempfile::tempdir().expect("tempdir");
    let storage = RecordingStorage::new();
    let store = MemoryMetadataStore::new();
    let state = support::test_state(
        root.path(),
        FakeTranscoder::flush_on_close(),
        storage.clone(),
        store.clone(),
    );
    let (addr, handle) = support::start_server(state).await.expect("start server");

    let client = Client::new();
    let (_resp, mut connection) = client
        .ws(format!("http://{addr}/ingest/late-flush"))
        .connect()
        .await
        .expect("connect producer");

    connection
        .send(ws::Message::Binary(Bytes::from_static(b"buffered")))
        .await
        .expect("send chunk");
    support::wait_until("record exists", || store.has_record("late-flush")).await;
    assert!(storage.is_empty());

    connection
        .send(ws::Message::Close(None))
        .await
        .expect("close producer");
    drop(connection);

    // The encoder only flushes on EOF; the drain grace period must keep the
    // watcher alive long enough to publish the trailing artifacts.
    support::wait_until("trailing flush uploaded", || {
        storage.contains("hls/late-flush/stream.m3u8")
            && storage.contains("hls/late-flush/segment_000.ts")
    })
    .await;
    support::wait_until("output directory removed", || {
        !root.path().join("late-flush").exists()
    })
    .await;

    handle.stop(true).await;
}
