use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, TextEncoder};

static SESSIONS_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "ingest_service_sessions_started_total",
        "Total producer ingest sessions accepted",
    ))
    .expect("failed to create ingest_service_sessions_started_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register ingest_service_sessions_started_total");
    counter
});

static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::with_opts(Opts::new(
        "ingest_service_sessions_active",
        "Currently active ingest sessions",
    ))
    .expect("failed to create ingest_service_sessions_active");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register ingest_service_sessions_active");
    gauge
});

static CHUNKS_RELAYED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "ingest_service_chunks_relayed_total",
        "Inbound media chunks forwarded to the transcoder",
    ))
    .expect("failed to create ingest_service_chunks_relayed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register ingest_service_chunks_relayed_total");
    counter
});

static ARTIFACTS_UPLOADED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "ingest_service_artifacts_uploaded_total",
        "Playlist and segment uploads that reached object storage",
    ))
    .expect("failed to create ingest_service_artifacts_uploaded_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register ingest_service_artifacts_uploaded_total");
    counter
});

static UPLOAD_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::with_opts(Opts::new(
        "ingest_service_upload_failures_total",
        "Artifact uploads that failed and were superseded",
    ))
    .expect("failed to create ingest_service_upload_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register ingest_service_upload_failures_total");
    counter
});

pub fn session_started() {
    SESSIONS_STARTED_TOTAL.inc();
    SESSIONS_ACTIVE.inc();
}

pub fn session_closed() {
    SESSIONS_ACTIVE.dec();
}

pub fn chunk_relayed() {
    CHUNKS_RELAYED_TOTAL.inc();
}

pub fn artifact_uploaded() {
    ARTIFACTS_UPLOADED_TOTAL.inc();
}

pub fn upload_failed() {
    UPLOAD_FAILURES_TOTAL.inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
