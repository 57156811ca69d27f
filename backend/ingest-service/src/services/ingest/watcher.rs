//! Output-directory watcher for freshly written playlist and segment files.
//!
//! A background task scans the stream's private output directory on a fixed
//! interval and emits one event per file whose size or mtime changed since
//! the previous scan. Bursts within one interval coalesce into a single
//! event per filename; every file that stabilizes on disk produces at least
//! one event. The sliding-window deletions ffmpeg performs are ignored.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One filesystem change affecting a relevant artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEvent {
    pub filename: String,
}

pub struct SegmentWatcher {
    task: JoinHandle<()>,
}

impl SegmentWatcher {
    /// Start watching `dir`. Events arrive on the returned channel until
    /// [`stop`](Self::stop) is called or the receiver is dropped.
    pub fn spawn(
        dir: PathBuf,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SegmentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut seen: HashMap<String, (SystemTime, u64)> = HashMap::new();
            let mut tick = tokio::time::interval(poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tick.tick().await;

                // The directory may not exist yet, or may already be gone
                // during teardown; both just skip the scan.
                let mut entries = match tokio::fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(_) => continue,
                };

                while let Ok(Some(entry)) = entries.next_entry().await {
                    let filename = entry.file_name().to_string_lossy().into_owned();
                    if !is_artifact(&filename) {
                        continue;
                    }
                    let Ok(meta) = entry.metadata().await else {
                        continue;
                    };
                    let signature = (
                        meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                        meta.len(),
                    );
                    if seen.get(&filename) != Some(&signature) {
                        seen.insert(filename.clone(), signature);
                        if tx.send(SegmentEvent { filename }).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        (Self { task }, rx)
    }

    /// Stop watching. No further events are emitted; safe to call even if no
    /// event ever fired.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SegmentWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_artifact(filename: &str) -> bool {
    filename.ends_with(".ts") || filename.ends_with(".m3u8")
}
