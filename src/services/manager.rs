//! Lifecycle manager for long-running services.
//!
//! Services register with the manager and are started and stopped together.
//! Services start in registration order and stop in reverse.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Health status of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of a service health check.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn healthy_with(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: Some(message.into()),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// A component with background tasks the manager can start, stop and health-check.
///
/// Log lifecycle events with [tracing] and include the service name, e.g.
/// `info!(service = %self.name(), "Started")`.
///
/// Stateless helpers (title parser, classifiers) are not services; they are
/// constructed once and passed where needed.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// Collects services, then builds or starts a [ServicesManager].
///
/// ```ignore
/// let manager = ServicesManager::builder()
///     .add_service(watcher.clone())
///     .start()
///     .await?;
/// ```
#[derive(Default)]
pub struct ServicesManagerBuilder {
    services: Vec<Arc<dyn Service>>,
}

impl ServicesManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// Register all services without starting them.
    pub async fn build(self) -> Arc<ServicesManager> {
        let manager = Arc::new(ServicesManager::new());
        for service in self.services {
            manager.register(service).await;
        }
        manager
    }

    pub async fn start(self) -> Result<Arc<ServicesManager>> {
        let manager = self.build().await;
        manager.start_all().await?;
        Ok(manager)
    }
}

#[derive(Default)]
pub struct ServicesManager {
    services: RwLock<Vec<Arc<dyn Service>>>,
    started: RwLock<HashSet<String>>,
}

impl ServicesManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ServicesManagerBuilder {
        ServicesManagerBuilder::new()
    }

    /// Register a service. A service with the same name is replaced but not stopped.
    pub async fn register(&self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        let mut services = self.services.write().await;
        if let Some(slot) = services.iter_mut().find(|s| s.name() == name) {
            warn!(service = %name, "Replacing registered service");
            *slot = service;
        } else {
            services.push(service);
        }
        info!(service = %name, "Service registered");
    }

    /// Start every service in registration order. Stops at the first failure.
    pub async fn start_all(&self) -> Result<()> {
        let services = self.services.read().await.clone();
        for service in services {
            let name = service.name().to_string();
            if let Err(e) = service.start().await {
                warn!(service = %name, error = %e, "Service start failed");
                return Err(e).context(format!("failed to start service {}", name));
            }
            self.started.write().await.insert(name.clone());
            info!(service = %name, "Service started");
        }
        Ok(())
    }

    /// Stop every service in reverse start order. Failures are logged, not returned.
    pub async fn stop_all(&self) -> Result<()> {
        let services = self.services.read().await.clone();
        for service in services.into_iter().rev() {
            let name = service.name().to_string();
            match service.stop().await {
                Ok(()) => info!(service = %name, "Service stopped"),
                Err(e) => warn!(service = %name, error = %e, "Service stop failed"),
            }
            self.started.write().await.remove(&name);
        }
        Ok(())
    }

    /// Health of every registered service. A failing check is reported as unhealthy.
    pub async fn health_all(&self) -> HashMap<String, ServiceHealth> {
        let services = self.services.read().await.clone();
        let mut out = HashMap::new();
        for service in services {
            let health = match service.health().await {
                Ok(h) => h,
                Err(e) => ServiceHealth::unhealthy(e.to_string()),
            };
            out.insert(service.name().to_string(), health);
        }
        out
    }

    pub async fn is_started(&self, name: &str) -> bool {
        self.started.read().await.contains(name)
    }
}
