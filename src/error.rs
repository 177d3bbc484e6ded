//! Error types for candidate processing
//!
//! Worker loops never propagate these past a single candidate: each one is
//! logged and the loop moves on to the next item.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::services::pipeline::CandidateState;

/// Failure while handling a single candidate file
#[derive(Debug, Error)]
pub enum OrganizerError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Title was detected as an episode but show, season or episode could not be extracted
    #[error("cannot extract show name and episode from '{title}'")]
    UnparseableEpisode { title: String },

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copy succeeded but removing the source failed; the copy was rolled back
    #[error("moved copy of {} to {} was rolled back: {source}", from.display(), to.display())]
    CopyRollback {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("candidate cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        from: CandidateState,
        to: CandidateState,
    },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl OrganizerError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = OrganizerError> = std::result::Result<T, E>;
