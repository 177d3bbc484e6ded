//! Watch-folder service.
//!
//! Implements [Service](crate::services::manager::Service). On start it builds a
//! fresh [Pipeline] and spawns one scanner, N stability workers and M processor
//! workers, all sharing one cancellation token. Stop cancels the token and
//! waits for every worker to finish its current item.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::classifiers::{AniListClassifier, TmdbMovieClassifier};
use super::manager::{Service, ServiceHealth};
use super::organizer::{DestinationLayout, Organizer, Routing, RoutingMode};
use super::pipeline::{Pipeline, PipelineStats};
use crate::jobs::{Processor, Scanner, StabilityGate, StabilitySettings};

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub watch_dir: PathBuf,
    pub destination_root: PathBuf,
    pub scan_interval: Duration,
    pub stability: StabilitySettings,
    pub queue_wait: Duration,
    pub stability_workers: usize,
    pub processor_workers: usize,
    pub routing: Routing,
    pub tmdb_api_key: Option<String>,
    pub classifier_timeout: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("./downloads"),
            destination_root: PathBuf::from("./library"),
            scan_interval: Duration::from_secs(5),
            stability: StabilitySettings::default(),
            queue_wait: Duration::from_secs(2),
            stability_workers: 1,
            processor_workers: 1,
            routing: Routing::default(),
            tmdb_api_key: None,
            classifier_timeout: Duration::from_secs(10),
        }
    }
}

/// Build the organizer, attaching network classifiers in classified mode
pub fn build_organizer(settings: &WatcherSettings) -> Result<Organizer> {
    let mut organizer = Organizer::new(
        DestinationLayout::new(&settings.destination_root),
        settings.routing,
    );

    if settings.routing.mode == RoutingMode::Classified {
        organizer = organizer.with_anime_classifier(Arc::new(AniListClassifier::new(
            settings.classifier_timeout,
        )?));

        match &settings.tmdb_api_key {
            Some(key) => {
                organizer = organizer.with_movie_classifier(Arc::new(TmdbMovieClassifier::new(
                    key.clone(),
                    settings.classifier_timeout,
                )?));
            }
            None => warn!("TMDB_API_KEY not set, movies will not be grouped by origin"),
        }
    }

    Ok(organizer)
}

struct WatcherRuntime {
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WatcherRuntime {
    /// Cancel and join every worker, then read the settled counters
    async fn shutdown(self) -> PipelineStats {
        self.cancel.cancel();
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Watcher worker ended abnormally");
            }
        }
        self.pipeline.stats()
    }
}

pub struct WatcherService {
    name: String,
    settings: WatcherSettings,
    organizer: Arc<Organizer>,
    inner: RwLock<Option<WatcherRuntime>>,
}

impl WatcherService {
    pub fn new(name: impl Into<String>, settings: WatcherSettings, organizer: Organizer) -> Self {
        Self {
            name: name.into(),
            settings,
            organizer: Arc::new(organizer),
            inner: RwLock::new(None),
        }
    }

    /// Counters of the running pipeline, `None` when stopped
    pub async fn stats(&self) -> Option<PipelineStats> {
        self.inner.read().await.as_ref().map(|rt| rt.pipeline.stats())
    }

    fn spawn_workers(
        &self,
        pipeline: &Arc<Pipeline>,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let s = &self.settings;
        let mut handles = Vec::with_capacity(1 + s.stability_workers + s.processor_workers);

        let scanner = Scanner::new(s.watch_dir.clone(), s.scan_interval, pipeline.clone());
        handles.push(tokio::spawn(scanner.run(cancel.clone())));

        for worker in 0..s.stability_workers {
            let gate = StabilityGate::new(pipeline.clone(), s.stability, s.queue_wait);
            handles.push(tokio::spawn(gate.run(worker, cancel.clone())));
        }

        for worker in 0..s.processor_workers {
            let processor =
                Processor::new(pipeline.clone(), self.organizer.clone(), s.queue_wait);
            handles.push(tokio::spawn(processor.run(worker, cancel.clone())));
        }

        handles
    }
}

#[async_trait]
impl Service for WatcherService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.is_some() {
            return Ok(());
        }

        let pipeline = Arc::new(Pipeline::new());
        let cancel = CancellationToken::new();
        let handles = self.spawn_workers(&pipeline, &cancel);

        *inner = Some(WatcherRuntime {
            pipeline,
            cancel,
            handles,
        });

        info!(
            service = %self.name,
            watch_dir = %self.settings.watch_dir.display(),
            destination = %self.settings.destination_root.display(),
            stability_workers = self.settings.stability_workers,
            processor_workers = self.settings.processor_workers,
            "Watcher started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let runtime = self.inner.write().await.take();
        if let Some(runtime) = runtime {
            info!(service = %self.name, "Watcher stopping");
            let stats = runtime.shutdown().await;
            info!(
                service = %self.name,
                moved = stats.moved,
                ignored = stats.ignored,
                errored = stats.errored,
                "Watcher stopped"
            );
        }
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        match self.stats().await {
            Some(stats) => Ok(ServiceHealth::healthy_with(format!(
                "discovered={} moved={} ignored={} errored={} pending={} ready={}",
                stats.discovered,
                stats.moved,
                stats.ignored,
                stats.errored,
                stats.pending_queue,
                stats.ready_queue
            ))),
            None => Ok(ServiceHealth::degraded("watcher not started")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::manager::HealthStatus;
    use crate::services::pipeline::CandidateState;

    #[tokio::test]
    async fn test_health_follows_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WatcherSettings {
            watch_dir: dir.path().join("in"),
            destination_root: dir.path().join("out"),
            scan_interval: Duration::from_millis(10),
            queue_wait: Duration::from_millis(10),
            ..WatcherSettings::default()
        };
        let organizer = build_organizer(&settings).unwrap();
        let service = WatcherService::new("watcher", settings, organizer);

        assert_eq!(service.health().await.unwrap().status, HealthStatus::Degraded);
        service.start().await.unwrap();
        assert_eq!(service.health().await.unwrap().status, HealthStatus::Healthy);
        assert!(service.stats().await.is_some());

        service.stop().await.unwrap();
        assert_eq!(service.health().await.unwrap().status, HealthStatus::Degraded);
        assert!(service.stats().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_counts_items_finished_while_joining() {
        let pipeline = Arc::new(Pipeline::new());
        let cancel = CancellationToken::new();
        let worker = {
            let pipeline = pipeline.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                // in-flight item completes after cancellation
                tokio::time::sleep(Duration::from_millis(20)).await;
                pipeline.record(CandidateState::Moved);
            })
        };
        let runtime = WatcherRuntime {
            pipeline,
            cancel,
            handles: vec![worker],
        };

        let stats = runtime.shutdown().await;
        assert_eq!(stats.moved, 1);
    }

    #[test]
    fn test_classified_mode_builds_without_tmdb_key() {
        let settings = WatcherSettings {
            routing: Routing {
                mode: RoutingMode::Classified,
                ..Routing::default()
            },
            ..WatcherSettings::default()
        };
        assert!(build_organizer(&settings).is_ok());
    }
}
