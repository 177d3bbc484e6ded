//! Processor job: takes ready files and moves them into the library

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::services::organizer::Organizer;
use crate::services::pipeline::{Candidate, CandidateState, Pipeline};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Moved(PathBuf),
    Vanished,
    Failed,
}

pub struct Processor {
    pipeline: Arc<Pipeline>,
    organizer: Arc<Organizer>,
    queue_wait: Duration,
}

impl Processor {
    pub fn new(
        pipeline: Arc<Pipeline>,
        organizer: Arc<Organizer>,
        queue_wait: Duration,
    ) -> Self {
        Self {
            pipeline,
            organizer,
            queue_wait,
        }
    }

    pub async fn process(&self, mut candidate: Candidate) -> ProcessOutcome {
        // Files can disappear between the gate and here
        match tokio::fs::try_exists(&candidate.path).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    candidate_id = %candidate.id,
                    path = %candidate.path.display(),
                    "Ready file is gone"
                );
                self.finish(&mut candidate, CandidateState::Ignored);
                return ProcessOutcome::Vanished;
            }
            Err(e) => {
                error!(
                    candidate_id = %candidate.id,
                    path = %candidate.path.display(),
                    error = %e,
                    "Could not check ready file"
                );
                self.finish(&mut candidate, CandidateState::Errored);
                return ProcessOutcome::Failed;
            }
        }

        match self.organizer.organize(&candidate.path).await {
            Ok(result) => {
                info!(
                    candidate_id = %candidate.id,
                    title = %result.title,
                    category = result.category.as_str(),
                    branch = result.branch.as_str(),
                    destination = %result.destination.display(),
                    "Organized file"
                );
                self.finish(&mut candidate, CandidateState::Moved);
                ProcessOutcome::Moved(result.destination)
            }
            Err(e) => {
                error!(
                    candidate_id = %candidate.id,
                    path = %candidate.path.display(),
                    error = %e,
                    "Failed to organize file"
                );
                self.finish(&mut candidate, CandidateState::Errored);
                ProcessOutcome::Failed
            }
        }
    }

    fn finish(&self, candidate: &mut Candidate, state: CandidateState) {
        match candidate.advance(state) {
            Ok(()) => self.pipeline.record(state),
            Err(e) => warn!(
                candidate_id = %candidate.id,
                error = %e,
                "Unexpected candidate state"
            ),
        }
    }

    pub async fn run(self, worker: usize, cancel: CancellationToken) {
        info!(worker, "Processor worker started");

        loop {
            let popped = tokio::select! {
                _ = cancel.cancelled() => break,
                popped = self.pipeline.ready.pop(self.queue_wait) => popped,
            };

            if let Some(candidate) = popped {
                self.process(candidate).await;
            }
        }

        info!(worker, "Processor worker stopped");
    }
}
