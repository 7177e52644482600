//! Backend client registry.
//!
//! Maps an environment name to the execution backend and archive for that
//! environment. Handles are created lazily and cached. Concurrent first
//! resolutions of one environment share a single connection attempt;
//! different environments connect in parallel.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use pr_core::{EnvironmentBackend, Error, PlatformConfig, Result};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{ArchiveBackend, BackendFactory, BackendHandles, DefaultBackendFactory, ExecutionBackend};

pub struct BackendRegistry {
    environments: RwLock<BTreeMap<String, EnvironmentBackend>>,
    factory: Arc<dyn BackendFactory>,
    /// One cell per environment; the cell serializes its own initialization
    handles: DashMap<String, Arc<OnceCell<BackendHandles>>>,
}

impl BackendRegistry {
    pub fn new(environments: BTreeMap<String, EnvironmentBackend>, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            environments: RwLock::new(environments),
            factory,
            handles: DashMap::new(),
        }
    }

    /// Registry over every configured environment, using HTTP backends
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self::new(config.environments.clone(), Arc::new(DefaultBackendFactory))
    }

    fn config(&self, environment: &str) -> Result<EnvironmentBackend> {
        self.environments
            .read()
            .unwrap()
            .get(environment)
            .cloned()
            .ok_or_else(|| Error::ConfigNotFound {
                environment: environment.to_string(),
            })
    }

    /// Execution and archive handles for an environment.
    pub async fn resolve(&self, environment: &str) -> Result<BackendHandles> {
        self.config(environment)?;

        // Clone the cell out so no map shard stays locked while connecting.
        let cell = self
            .handles
            .entry(environment.to_string())
            .or_default()
            .value()
            .clone();

        let handles = cell
            .get_or_try_init(|| async {
                // Read under the cell: a reconfiguration that replaced this
                // cell meanwhile leaves it orphaned rather than stale.
                let config = self.config(environment)?;
                debug!(environment, "Connecting backend");
                self.factory.connect(environment, &config).await
            })
            .await?;
        Ok(handles.clone())
    }

    pub async fn execution(&self, environment: &str) -> Result<Arc<dyn ExecutionBackend>> {
        Ok(self.resolve(environment).await?.execution)
    }

    pub async fn archive(&self, environment: &str) -> Result<Arc<dyn ArchiveBackend>> {
        Ok(self.resolve(environment).await?.archive)
    }

    /// Drop the cached handle so the next resolution reconnects.
    pub fn invalidate(&self, environment: &str) {
        if self.handles.remove(environment).is_some() {
            info!(environment, "Invalidated backend handle");
        }
    }

    /// Invalidate after a transient failure of `failed`. Other errors, and
    /// handles already replaced by a reconnect, leave the cache alone.
    pub fn invalidate_on_failure(&self, environment: &str, failed: &Arc<dyn ExecutionBackend>, err: &Error) {
        if !err.kind().is_retryable() {
            return;
        }
        warn!(environment, error = %err, "Backend failure");
        let removed = self.handles.remove_if(environment, |_, cell| {
            cell.get()
                .is_some_and(|handles| Arc::ptr_eq(&handles.execution, failed))
        });
        if removed.is_some() {
            info!(environment, "Invalidated backend handle");
        }
    }

    /// Add or replace an environment's backend configuration
    pub fn upsert_environment(&self, environment: &str, config: EnvironmentBackend) {
        let previous = self
            .environments
            .write()
            .unwrap()
            .insert(environment.to_string(), config.clone());
        if previous.as_ref() != Some(&config) {
            self.invalidate(environment);
        }
    }

    pub fn remove_environment(&self, environment: &str) {
        self.environments.write().unwrap().remove(environment);
        self.invalidate(environment);
    }

    /// Configured environment names in sorted order
    pub fn environments(&self) -> Vec<String> {
        self.environments.read().unwrap().keys().cloned().collect()
    }

    /// Number of environments with a live cached handle
    pub fn connected(&self) -> usize {
        self.handles.iter().filter(|entry| entry.value().initialized()).count()
    }
}
