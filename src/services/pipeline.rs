//! Shared state of the watch pipeline
//!
//! A file moves through `Discovered -> Stabilizing -> Ready -> Moved`, and may
//! drop out as `Ignored` or `Errored` from any non-terminal state. The
//! [`Pipeline`] owns the seen-set and both hand-off queues:
//!
//! ```text
//! Scanner --pending--> StabilityGate --ready--> Processor
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job_queue::WorkQueue;
use crate::error::{OrganizerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    Discovered,
    Stabilizing,
    Ready,
    Moved,
    Ignored,
    Errored,
}

impl CandidateState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateState::Moved | CandidateState::Ignored | CandidateState::Errored
        )
    }

    pub fn can_advance_to(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        match (self, next) {
            (Discovered, Stabilizing) | (Stabilizing, Ready) | (Ready, Moved) => true,
            (from, Ignored | Errored) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// A file found in the watched directory
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub path: PathBuf,
    pub state: CandidateState,
    pub discovered_at: DateTime<Utc>,
}

impl Candidate {
    pub fn discovered(path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            state: CandidateState::Discovered,
            discovered_at: Utc::now(),
        }
    }

    pub fn advance(&mut self, next: CandidateState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(OrganizerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Paths already handed to the pipeline; entries are never removed
#[derive(Debug, Default)]
pub struct SeenSet {
    paths: Mutex<HashSet<PathBuf>>,
}

impl SeenSet {
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }

    /// Record `path` and run `enqueue` while still holding the lock.
    ///
    /// Returns false, without calling `enqueue`, if the path was already seen.
    pub fn admit<F: FnOnce(PathBuf)>(&self, path: &Path, enqueue: F) -> bool {
        let mut paths = self.paths.lock();
        if !paths.insert(path.to_path_buf()) {
            return false;
        }
        enqueue(path.to_path_buf());
        true
    }
}

#[derive(Debug, Default)]
struct Counters {
    discovered: AtomicU64,
    ready: AtomicU64,
    moved: AtomicU64,
    ignored: AtomicU64,
    errored: AtomicU64,
}

/// Point-in-time pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub discovered: u64,
    pub ready: u64,
    pub moved: u64,
    pub ignored: u64,
    pub errored: u64,
    pub pending_queue: usize,
    pub ready_queue: usize,
}

pub struct Pipeline {
    seen: SeenSet,
    pub pending: WorkQueue<Candidate>,
    pub ready: WorkQueue<Candidate>,
    counters: Counters,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            seen: SeenSet::default(),
            pending: WorkQueue::new("pending"),
            ready: WorkQueue::new("ready"),
            counters: Counters::default(),
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Queue a newly listed path for stability checking.
    ///
    /// Returns the new candidate id, or `None` if the path was seen before.
    pub fn offer(&self, path: &Path) -> Option<Uuid> {
        let mut id = None;
        self.seen.admit(path, |path| {
            let candidate = Candidate::discovered(path);
            id = Some(candidate.id);
            self.pending.push(candidate);
        });

        if id.is_some() {
            self.record(CandidateState::Discovered);
        }
        id
    }

    pub fn record(&self, state: CandidateState) {
        let counter = match state {
            CandidateState::Discovered => &self.counters.discovered,
            CandidateState::Ready => &self.counters.ready,
            CandidateState::Moved => &self.counters.moved,
            CandidateState::Ignored => &self.counters.ignored,
            CandidateState::Errored => &self.counters.errored,
            CandidateState::Stabilizing => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            discovered: self.counters.discovered.load(Ordering::Relaxed),
            ready: self.counters.ready.load(Ordering::Relaxed),
            moved: self.counters.moved.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            errored: self.counters.errored.load(Ordering::Relaxed),
            pending_queue: self.pending.len(),
            ready_queue: self.ready.len(),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn test_happy_path_transitions() {
        let mut candidate = Candidate::discovered(PathBuf::from("/dl/a.mkv"));
        candidate.advance(CandidateState::Stabilizing).unwrap();
        candidate.advance(CandidateState::Ready).unwrap();
        candidate.advance(CandidateState::Moved).unwrap();
        assert_eq!(candidate.state, CandidateState::Moved);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut candidate = Candidate::discovered(PathBuf::from("/dl/a.mkv"));
        assert_matches!(
            candidate.advance(CandidateState::Ready),
            Err(OrganizerError::InvalidTransition {
                from: CandidateState::Discovered,
                to: CandidateState::Ready
            })
        );

        candidate.advance(CandidateState::Ignored).unwrap();
        assert!(candidate.advance(CandidateState::Errored).is_err());
        assert!(candidate.advance(CandidateState::Stabilizing).is_err());
    }

    #[test]
    fn test_drop_out_from_any_live_state() {
        for state in [
            CandidateState::Discovered,
            CandidateState::Stabilizing,
            CandidateState::Ready,
        ] {
            assert!(state.can_advance_to(CandidateState::Ignored));
            assert!(state.can_advance_to(CandidateState::Errored));
        }
        assert!(!CandidateState::Moved.can_advance_to(CandidateState::Errored));
    }

    #[test]
    fn test_offer_deduplicates() {
        let pipeline = Pipeline::new();
        let path = PathBuf::from("/dl/a.mkv");

        assert!(pipeline.offer(&path).is_some());
        assert!(pipeline.offer(&path).is_none());
        assert!(pipeline.offer(&PathBuf::from("/dl/b.mkv")).is_some());

        assert_eq!(pipeline.pending.len(), 2);
        assert_eq!(pipeline.seen().len(), 2);
        assert_eq!(pipeline.stats().discovered, 2);
    }

    #[test]
    fn test_offer_is_atomic_across_threads() {
        let pipeline = Arc::new(Pipeline::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| PathBuf::from(format!("/dl/{i}.mkv")))
                        .filter(|path| pipeline.offer(path).is_some())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(pipeline.pending.len(), 50);
    }

    #[test]
    fn test_stats_counts_outcomes() {
        let pipeline = Pipeline::new();
        pipeline.record(CandidateState::Ready);
        pipeline.record(CandidateState::Moved);
        pipeline.record(CandidateState::Ignored);
        pipeline.record(CandidateState::Stabilizing);

        let stats = pipeline.stats();
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.errored, 0);
    }
}
