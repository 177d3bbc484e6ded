//! Watch-directory scanner job
//!
//! Lists the top level of the watched directory every interval and offers
//! each regular file to the pipeline. Subdirectories and symlinks are skipped.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::pipeline::Pipeline;

pub struct Scanner {
    watch_dir: PathBuf,
    interval: Duration,
    pipeline: Arc<Pipeline>,
}

impl Scanner {
    pub fn new(watch_dir: PathBuf, interval: Duration, pipeline: Arc<Pipeline>) -> Self {
        Self {
            watch_dir,
            interval,
            pipeline,
        }
    }

    /// One listing pass. Returns the paths that were new to the pipeline.
    pub async fn scan_once(&self) -> Vec<PathBuf> {
        let mut admitted = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.watch_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(
                    watch_dir = %self.watch_dir.display(),
                    "Watch directory does not exist yet"
                );
                return admitted;
            }
            Err(e) => {
                warn!(
                    watch_dir = %self.watch_dir.display(),
                    error = %e,
                    "Failed to list watch directory"
                );
                return admitted;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        watch_dir = %self.watch_dir.display(),
                        error = %e,
                        "Directory listing interrupted"
                    );
                    break;
                }
            };

            // file_type does not follow symlinks
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                _ => continue,
            }

            let path = entry.path();
            if let Some(id) = self.pipeline.offer(&path) {
                info!(candidate_id = %id, path = %path.display(), "Detected new file");
                admitted.push(path);
            }
        }

        admitted
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(
            watch_dir = %self.watch_dir.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Scanner started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.scan_once().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Scanner stopped");
    }
}
