//! Stability gate job
//!
//! A file is ready once its size has been the same non-zero value for
//! `required_checks` consecutive samples taken `delay` apart. Zero-byte
//! samples never count: Telegram clients create the file before writing.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{OrganizerError, Result};
use crate::services::file_utils::{format_bytes, is_video_file};
use crate::services::pipeline::{Candidate, CandidateState, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilitySettings {
    pub delay: Duration,
    pub required_checks: u32,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            required_checks: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityStatus {
    Settling { agreeing: u32 },
    Stable,
}

/// Run-length counter over successive size samples
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    required: u32,
    last_size: Option<u64>,
    agreeing: u32,
}

impl StabilityTracker {
    pub fn new(required: u32) -> Self {
        Self {
            required,
            last_size: None,
            agreeing: 0,
        }
    }

    pub fn observe(&mut self, size: u64) -> StabilityStatus {
        if size == 0 {
            self.agreeing = 0;
        } else if self.last_size == Some(size) {
            self.agreeing += 1;
        } else {
            self.agreeing = 1;
        }
        self.last_size = Some(size);

        if self.agreeing >= self.required {
            StabilityStatus::Stable
        } else {
            StabilityStatus::Settling {
                agreeing: self.agreeing,
            }
        }
    }
}

/// Result of waiting on one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable { size: u64 },
    Vanished,
    Cancelled,
}

/// What the gate did with a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Ready,
    NotVideo,
    Vanished,
    Cancelled,
    Failed,
}

/// Ready for a video, otherwise NotVideo unless the file is already gone
async fn settled_outcome(path: &Path) -> GateOutcome {
    if is_video_file(path).await {
        return GateOutcome::Ready;
    }
    match tokio::fs::try_exists(path).await {
        Ok(false) => GateOutcome::Vanished,
        _ => GateOutcome::NotVideo,
    }
}

pub struct StabilityGate {
    pipeline: Arc<Pipeline>,
    settings: StabilitySettings,
    queue_wait: Duration,
}

impl StabilityGate {
    pub fn new(
        pipeline: Arc<Pipeline>,
        settings: StabilitySettings,
        queue_wait: Duration,
    ) -> Self {
        Self {
            pipeline,
            settings,
            queue_wait,
        }
    }

    /// Poll the size of `path` until it settles, disappears or shutdown begins
    pub async fn wait_until_stable(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Stability> {
        let mut tracker = StabilityTracker::new(self.settings.required_checks);

        loop {
            if cancel.is_cancelled() {
                return Ok(Stability::Cancelled);
            }

            let size = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Stability::Vanished),
                Err(e) => return Err(OrganizerError::io(path, e)),
            };

            match tracker.observe(size) {
                StabilityStatus::Stable => return Ok(Stability::Stable { size }),
                StabilityStatus::Settling { agreeing } => {
                    debug!(path = %path.display(), size, agreeing, "Waiting for file to settle");
                }
            }

            tokio::time::sleep(self.settings.delay).await;
        }
    }

    /// Gate one candidate, forwarding it to the ready queue if it qualifies
    pub async fn check(
        &self,
        mut candidate: Candidate,
        cancel: &CancellationToken,
    ) -> GateOutcome {
        if let Err(e) = candidate.advance(CandidateState::Stabilizing) {
            warn!(candidate_id = %candidate.id, error = %e, "Skipping candidate");
            return GateOutcome::Failed;
        }

        let outcome = match self.wait_until_stable(&candidate.path, cancel).await {
            Ok(Stability::Stable { size }) => {
                let outcome = settled_outcome(&candidate.path).await;
                match outcome {
                    GateOutcome::Ready => info!(
                        candidate_id = %candidate.id,
                        file = %candidate.file_name(),
                        size = %format_bytes(size),
                        "File is stable"
                    ),
                    GateOutcome::Vanished => debug!(
                        candidate_id = %candidate.id,
                        path = %candidate.path.display(),
                        "File vanished after settling"
                    ),
                    _ => info!(
                        candidate_id = %candidate.id,
                        file = %candidate.file_name(),
                        "Ignoring non-video file"
                    ),
                }
                outcome
            }
            Ok(Stability::Vanished) => {
                debug!(
                    candidate_id = %candidate.id,
                    path = %candidate.path.display(),
                    "File vanished while settling"
                );
                GateOutcome::Vanished
            }
            Ok(Stability::Cancelled) => {
                debug!(candidate_id = %candidate.id, "Stability check abandoned on shutdown");
                return GateOutcome::Cancelled;
            }
            Err(e) => {
                error!(candidate_id = %candidate.id, error = %e, "Stability check failed");
                GateOutcome::Failed
            }
        };

        let next = match outcome {
            GateOutcome::Ready => CandidateState::Ready,
            GateOutcome::Failed => CandidateState::Errored,
            _ => CandidateState::Ignored,
        };
        if candidate.advance(next).is_ok() {
            self.pipeline.record(next);
        }
        if outcome == GateOutcome::Ready {
            self.pipeline.ready.push(candidate);
        }

        outcome
    }

    pub async fn run(self, worker: usize, cancel: CancellationToken) {
        info!(worker, "Stability worker started");

        loop {
            let popped = tokio::select! {
                _ = cancel.cancelled() => break,
                popped = self.pipeline.pending.pop(self.queue_wait) => popped,
            };

            if let Some(candidate) = popped {
                self.check(candidate, &cancel).await;
            }
        }

        info!(worker, "Stability worker stopped");
    }
}
