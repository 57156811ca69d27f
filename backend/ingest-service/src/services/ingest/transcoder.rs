//! Transcoder process handle.
//!
//! One external encoding process per stream, fed over stdin and observed via
//! stderr and its exit status. The session logic only depends on the
//! [`Transcoder`] capability, so alternative encoders can be substituted
//! without touching it.

use crate::error::AppError;
use bytes::Bytes;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Fixed per stream; the playlist mutates in place.
pub const PLAYLIST_FILENAME: &str = "stream.m3u8";
/// Zero-padded sequence counter, expanded by the encoder.
pub const SEGMENT_FILENAME_TEMPLATE: &str = "segment_%03d.ts";

/// Terminal status of the encoding process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscoderExit {
    pub code: Option<i32>,
}

/// Write side of a running transcoder. All operations are non-blocking;
/// chunks are relayed to the process in strict arrival order.
pub trait TranscoderInput: Send + Unpin + 'static {
    /// Forward one chunk. Once the process is gone this becomes a no-op,
    /// reported once through the diagnostic log.
    fn write(&mut self, chunk: Bytes);

    /// Signal end-of-input so the process can flush remaining segments.
    fn close(&mut self);

    /// Force-terminate a process that outlived its grace period.
    fn kill(&mut self);
}

pub struct SpawnedTranscoder {
    pub input: Box<dyn TranscoderInput>,
    pub exit: oneshot::Receiver<TranscoderExit>,
}

/// Launcher capability: one call per stream session.
pub trait Transcoder: Send + Sync {
    fn start(&self, stream_id: &str, output_dir: &Path) -> Result<SpawnedTranscoder, AppError>;
}

/// ffmpeg-backed transcoder with a fixed, non-negotiable argument contract:
/// low-latency x264, 25 fps with a one-second keyframe cadence (scene
/// detection off so segment boundaries stay deterministic), AAC audio, and
/// HLS output with a five-entry sliding window of independent segments.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

fn hls_args(output_dir: &Path) -> Vec<String> {
    let segment_template = output_dir.join(SEGMENT_FILENAME_TEMPLATE);
    let playlist = output_dir.join(PLAYLIST_FILENAME);

    let mut args: Vec<String> = [
        "-i",
        "pipe:0",
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-tune",
        "zerolatency",
        "-r",
        "25",
        "-g",
        "25", // keyframe every 25 frames = 1 second
        "-keyint_min",
        "25",
        "-sc_threshold",
        "0",
        "-c:a",
        "aac",
        "-f",
        "hls",
        "-hls_time",
        "1",
        "-hls_list_size",
        "5",
        "-hls_flags",
        "delete_segments+independent_segments",
        "-hls_segment_filename",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(segment_template.to_string_lossy().into_owned());
    args.push(playlist.to_string_lossy().into_owned());
    args
}

impl Transcoder for FfmpegTranscoder {
    fn start(&self, stream_id: &str, output_dir: &Path) -> Result<SpawnedTranscoder, AppError> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(hls_args(output_dir))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::TranscoderSpawn(format!("{}: {e}", self.ffmpeg_path)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::TranscoderSpawn("transcoder stdin unavailable".into()))?;
        let stderr = child.stderr.take();

        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Bytes>();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel::<TranscoderExit>();

        // stdin pump: strict arrival order; closing the channel signals EOF
        // so the process can flush its trailing segments.
        tokio::spawn(async move {
            while let Some(chunk) = input_rx.recv().await {
                if let Err(err) = stdin.write_all(&chunk).await {
                    debug!(target: "ffmpeg", error = %err, "stdin write failed; stopping relay");
                    return;
                }
            }
            let _ = stdin.shutdown().await;
        });

        if let Some(stderr) = stderr {
            let stream_id = stream_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "ffmpeg", stream_id = %stream_id, "{line}");
                }
            });
        }

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.ok(),
                _ = &mut kill_rx => {
                    let _ = child.kill().await;
                    child.wait().await.ok()
                }
            };
            let _ = exit_tx.send(TranscoderExit {
                code: status.and_then(|s| s.code()),
            });
        });

        Ok(SpawnedTranscoder {
            input: Box::new(FfmpegInput {
                tx: Some(input_tx),
                kill: Some(kill_tx),
                input_gone_logged: false,
            }),
            exit: exit_rx,
        })
    }
}

struct FfmpegInput {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    kill: Option<oneshot::Sender<()>>,
    input_gone_logged: bool,
}

impl TranscoderInput for FfmpegInput {
    fn write(&mut self, chunk: Bytes) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(chunk).is_err() && !self.input_gone_logged {
            self.input_gone_logged = true;
            warn!(target: "ffmpeg", "transcoder input is gone; discarding further chunks");
        }
    }

    fn close(&mut self) {
        self.tx = None;
    }

    fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}
