//! Read-API behavior against the in-memory metadata store.

use actix_web::{body, test, web, App};

use ingest_service::handlers;

use super::support::{self, FakeTranscoder, MemoryMetadataStore, RecordingStorage};

#[actix_rt::test]
async fn unknown_stream_is_not_live_rather_than_an_error() {
    let root = tempfile::tempdir().expect("tempdir");
    let state = support::test_state(
        root.path(),
        FakeTranscoder::never_flush(),
        RecordingStorage::new(),
        MemoryMetadataStore::new(),
    );

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .route("/api/stream/{stream_id}", web::get().to(handlers::get_stream)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/stream/unknown-id")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let bytes = body::to_bytes(resp.into_body()).await.expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["error"], "Stream not live");
}

#[actix_rt::test]
async fn record_without_a_playlist_url_is_not_live() {
    let root = tempfile::tempdir().expect("tempdir");
    let store = MemoryMetadataStore::new();
    store.seed("warming-up", None, 4);
    let state = support::test_state(
        root.path(),
        FakeTranscoder::never_flush(),
        RecordingStorage::new(),
        store,
    );

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .route("/api/stream/{stream_id}", web::get().to(handlers::get_stream)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/stream/warming-up")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_rt::test]
async fn live_stream_returns_url_viewers_and_timestamp() {
    let root = tempfile::tempdir().expect("tempdir");
    let store = MemoryMetadataStore::new();
    store.seed(
        "abc123",
        Some("https://cdn.test/hls/abc123/stream.m3u8"),
        7,
    );
    let state = support::test_state(
        root.path(),
        FakeTranscoder::never_flush(),
        RecordingStorage::new(),
        store,
    );

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .route("/api/stream/{stream_id}", web::get().to(handlers::get_stream)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/stream/abc123")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let bytes = body::to_bytes(resp.into_body()).await.expect("body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(json["url"], "https://cdn.test/hls/abc123/stream.m3u8");
    assert_eq!(json["viewers"], 7);
    assert!(json["updatedAt"].is_string());
}
