//! Stream session lifecycle manager.
//!
//! One actor per accepted producer connection, owning the transcoder
//! process, the segment watcher and the upload fan-out for a single stream
//! identifier. The actor mailbox is the session's single-threaded control
//! loop: socket frames, watcher events, upload completions and the process
//! exit all re-enter here, so state transitions never race.
//!
//! States run `Starting -> Relaying -> Draining -> Terminated`, each visited
//! at most once. A failure in any per-chunk or per-artifact path is logged
//! and isolated; only spawn failure and connection loss end the session.

use actix::prelude::*;
use actix_web_actors::ws;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::metrics;
use crate::AppState;

use super::metadata_store::StreamMetadataStore;
use super::publisher::ArtifactPublisher;
use super::transcoder::{Transcoder, TranscoderExit, TranscoderInput, PLAYLIST_FILENAME};
use super::watcher::{SegmentEvent, SegmentWatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Starting,
    Relaying,
    Draining,
    Terminated,
}

/// Completion notice from an off-loop upload task.
#[derive(Message)]
#[rtype(result = "()")]
struct ArtifactPublished {
    filename: String,
}

pub struct IngestSession {
    stream_id: String,
    output_dir: PathBuf,
    state: SessionState,
    transcoder: Arc<dyn Transcoder>,
    publisher: Arc<ArtifactPublisher>,
    metadata: Arc<dyn StreamMetadataStore>,
    input: Option<Box<dyn TranscoderInput>>,
    watcher: Option<SegmentWatcher>,
    watch_poll: Duration,
    drain_grace: Duration,
    drain_timer: Option<SpawnHandle>,
    playlist_published: bool,
}

impl IngestSession {
    pub fn new(stream_id: &str, state: &AppState) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            output_dir: state.config.hls.root_dir.join(stream_id),
            state: SessionState::Starting,
            transcoder: state.transcoder.clone(),
            publisher: state.publisher.clone(),
            metadata: state.metadata.clone(),
            input: None,
            watcher: None,
            watch_poll: Duration::from_millis(state.config.hls.watch_poll_ms),
            drain_grace: Duration::from_millis(state.config.hls.drain_grace_ms),
            drain_timer: None,
            playlist_published: false,
        }
    }

    /// `Starting`: acquire every resource the session owns. Any failure here
    /// goes straight to `Terminated` with cleanup.
    fn begin(&mut self, ctx: &mut ws::WebsocketContext<Self>) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;

        let spawned = self.transcoder.start(&self.stream_id, &self.output_dir)?;
        self.input = Some(spawned.input);
        ctx.spawn(
            spawned
                .exit
                .into_actor(self)
                .map(|res, act, ctx| act.on_transcoder_exit(res.ok(), ctx)),
        );

        let (watcher, events) = SegmentWatcher::spawn(self.output_dir.clone(), self.watch_poll);
        self.watcher = Some(watcher);
        ctx.add_stream(UnboundedReceiverStream::new(events));

        self.state = SessionState::Relaying;

        // Seed the liveness record off-loop; a store hiccup must not keep
        // the producer from streaming.
        let metadata = self.metadata.clone();
        let stream_id = self.stream_id.clone();
        actix_rt::spawn(async move {
            if let Err(err) = metadata.init_record(&stream_id).await {
                warn!(%stream_id, error = %err, "failed to seed stream metadata");
            }
        });

        Ok(())
    }

    fn relay_chunk(&mut self, chunk: Bytes) {
        if self.state != SessionState::Relaying {
            return;
        }
        if let Some(input) = self.input.as_mut() {
            input.write(chunk);
        }
        metrics::chunk_relayed();

        let metadata = self.metadata.clone();
        let stream_id = self.stream_id.clone();
        actix_rt::spawn(async move {
            if let Err(err) = metadata.bump_activity(&stream_id).await {
                debug!(%stream_id, error = %err, "dropped activity increment");
            }
        });
    }

    /// `Draining`: the producer is gone; let the transcoder flush its trailing
    /// segments while the watcher keeps running. Finalization happens when the
    /// process exits, or at the latest when the grace period elapses.
    fn begin_draining(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if !matches!(self.state, SessionState::Starting | SessionState::Relaying) {
            return;
        }
        self.state = SessionState::Draining;
        debug!(stream_id = %self.stream_id, "connection closed; draining transcoder");

        if let Some(input) = self.input.as_mut() {
            input.close();
        }
        self.drain_timer = Some(ctx.run_later(self.drain_grace, |act, ctx| {
            act.drain_timer = None;
            act.finalize(ctx);
        }));
    }

    fn on_transcoder_exit(
        &mut self,
        exit: Option<TranscoderExit>,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let code = exit.and_then(|e| e.code);
        match self.state {
            SessionState::Draining => {
                debug!(stream_id = %self.stream_id, ?code, "transcoder flushed and exited");
                // One more watcher interval so last-moment segment flushes
                // still produce events before the watcher stops.
                if let Some(handle) = self.drain_timer.take() {
                    ctx.cancel_future(handle);
                }
                let settle = self.watch_poll * 2;
                self.drain_timer = Some(ctx.run_later(settle, |act, ctx| {
                    act.drain_timer = None;
                    act.finalize(ctx);
                }));
            }
            SessionState::Starting | SessionState::Relaying => {
                warn!(
                    stream_id = %self.stream_id,
                    ?code,
                    "transcoder exited before input was closed; ending session"
                );
                ctx.close(Some(ws::CloseCode::Error.into()));
                self.finalize(ctx);
            }
            SessionState::Terminated => {}
        }
    }

    /// `Terminated`: release everything and stop the actor. In-flight uploads
    /// may still complete, but their outcomes no longer reach this session.
    fn finalize(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(handle) = self.drain_timer.take() {
            ctx.cancel_future(handle);
        }
        self.release_resources();
        ctx.stop();
    }

    fn release_resources(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        info!(stream_id = %self.stream_id, "session terminated");

        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(mut input) = self.input.take() {
            input.close();
            input.kill();
        }
        metrics::session_closed();

        let metadata = self.metadata.clone();
        let publisher = self.publisher.clone();
        let stream_id = self.stream_id.clone();
        let output_dir = self.output_dir.clone();
        actix_rt::spawn(async move {
            if let Err(err) = metadata.mark_ended(&stream_id).await {
                warn!(%stream_id, error = %err, "failed to reset stream metadata");
            }
            if let Err(err) = tokio::fs::remove_dir_all(&output_dir).await {
                warn!(%stream_id, error = %err, "failed to remove session output directory");
            }
            publisher.forget_stream(&stream_id);
        });
    }
}

impl Actor for IngestSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        metrics::session_started();
        info!(stream_id = %self.stream_id, "ingest session started");

        if let Err(err) = self.begin(ctx) {
            error!(stream_id = %self.stream_id, error = %err, "failed to start ingest session");
            ctx.close(Some(ws::CloseCode::Error.into()));
            self.finalize(ctx);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Last-resort guard for abrupt stops that bypassed finalize.
        self.release_resources();
    }
}

impl StreamHandler<std::result::Result<ws::Message, ws::ProtocolError>> for IngestSession {
    fn handle(
        &mut self,
        msg: std::result::Result<ws::Message, ws::ProtocolError>,
        ctx: &mut Self::Context,
    ) {
        match msg {
            Ok(ws::Message::Binary(chunk)) => self.relay_chunk(chunk),
            Ok(ws::Message::Text(text)) => self.relay_chunk(text.into_bytes()),
            // Fragmented frames carry media bytes too; the transcoder input
            // is a byte pipe, so message boundaries do not matter.
            Ok(ws::Message::Continuation(item)) => match item {
                actix_http::ws::Item::FirstText(chunk)
                | actix_http::ws::Item::FirstBinary(chunk)
                | actix_http::ws::Item::Continue(chunk)
                | actix_http::ws::Item::Last(chunk) => self.relay_chunk(chunk),
            },
            Ok(ws::Message::Ping(payload)) => ctx.pong(&payload),
            Ok(ws::Message::Pong(_)) | Ok(ws::Message::Nop) => {}
            Ok(ws::Message::Close(reason)) => {
                debug!(stream_id = %self.stream_id, ?reason, "producer closed connection");
                ctx.close(reason);
                self.begin_draining(ctx);
            }
            Err(err) => {
                warn!(stream_id = %self.stream_id, error = %err, "websocket protocol error");
                self.begin_draining(ctx);
            }
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        self.begin_draining(ctx);
    }
}

impl StreamHandler<SegmentEvent> for IngestSession {
    fn handle(&mut self, event: SegmentEvent, ctx: &mut Self::Context) {
        if self.state == SessionState::Terminated {
            return;
        }

        let publisher = self.publisher.clone();
        let stream_id = self.stream_id.clone();
        let local_path = self.output_dir.join(&event.filename);
        let addr = ctx.address();
        actix_rt::spawn(async move {
            match publisher.publish(&stream_id, &event.filename, &local_path).await {
                Ok(_) => {
                    metrics::artifact_uploaded();
                    addr.do_send(ArtifactPublished {
                        filename: event.filename,
                    });
                }
                Err(err) => {
                    metrics::upload_failed();
                    warn!(%stream_id, filename = %event.filename, error = %err, "artifact upload failed");
                }
            }
        });
    }

    // The watcher channel closing must not stop the actor; the session
    // lifecycle is driven by the socket and the transcoder exit.
    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl Handler<ArtifactPublished> for IngestSession {
    type Result = ();

    fn handle(&mut self, msg: ArtifactPublished, _ctx: &mut Self::Context) {
        if self.state == SessionState::Terminated {
            return;
        }
        if self.playlist_published || msg.filename != PLAYLIST_FILENAME {
            return;
        }
        self.playlist_published = true;

        let url = self.publisher.playlist_url(&self.stream_id);
        info!(stream_id = %self.stream_id, %url, "stream playlist is live");

        let metadata = self.metadata.clone();
        let stream_id = self.stream_id.clone();
        actix_rt::spawn(async move {
            if let Err(err) = metadata.publish_url(&stream_id, &url).await {
                warn!(%stream_id, error = %err, "failed to record playlist url");
            }
        });
    }
}
