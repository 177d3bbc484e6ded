//! Pipeline building blocks and long-running services

pub mod classifiers;
pub mod file_utils;
pub mod filename_parser;
pub mod job_queue;
pub mod logging;
pub mod manager;
pub mod organizer;
pub mod pipeline;
pub mod watcher;

pub use classifiers::{
    AniListClassifier, AnimeClassifier, MovieClassifier, MovieOrigin, TmdbMovieClassifier,
};
pub use filename_parser::{EpisodeInfo, MediaCategory, ParsedTitle, parse_title};
pub use logging::{LogFormat, init_tracing};
pub use manager::{HealthStatus, Service, ServiceHealth, ServicesManager};
pub use organizer::{
    Branch, DestinationLayout, OrganizeResult, Organizer, Routing, RoutingMode, safe_move,
};
pub use pipeline::{Candidate, CandidateState, Pipeline, PipelineStats};
pub use watcher::{WatcherService, WatcherSettings, build_organizer};
