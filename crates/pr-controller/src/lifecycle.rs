//! Create and stop runs on an environment's execution backend.

use std::sync::Arc;

use pr_backend::{BackendRegistry, CreatePayload, EventId};
use pr_core::{ClusterId, Result, ResultExt, RunId, RunLabels};
use tracing::{info, instrument};

pub struct Lifecycle {
    registry: Arc<BackendRegistry>,
}

impl Lifecycle {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Submit a run. The backend object is tied to the platform run later,
    /// through the labels the payload carries.
    #[instrument(skip(self, payload), fields(cluster = %payload.cluster, run_id = payload.pipelinerun_id))]
    pub async fn create(&self, environment: &str, payload: &CreatePayload) -> Result<EventId> {
        const OP: &str = "lifecycle: create pipelinerun";

        payload.validate().op(OP)?;
        let backend = self.registry.execution(environment).await.op(OP)?;
        match backend.create(payload).await {
            Ok(event_id) => {
                info!(event_id = %event_id, "Created pipelinerun");
                Ok(event_id)
            }
            Err(e) => {
                self.registry.invalidate_on_failure(environment, &backend, &e);
                Err(e.op(OP))
            }
        }
    }

    /// Cancel a run. Runs that are already finished, already stopped or
    /// unknown to the backend count as stopped.
    #[instrument(skip(self))]
    pub async fn stop(&self, environment: &str, cluster: &str, cluster_id: ClusterId, run_id: RunId) -> Result<()> {
        const OP: &str = "lifecycle: stop pipelinerun";

        let backend = self.registry.execution(environment).await.op(OP)?;
        let labels = RunLabels::new(cluster, cluster_id, run_id);
        if let Err(e) = backend.stop(&labels).await {
            self.registry.invalidate_on_failure(environment, &backend, &e);
            return Err(e.op(OP));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pr_backend::{BackendFactory, BackendHandles, MemoryArchive, MemoryExecutionBackend};
    use pr_core::{ArchiveConfig, EnvironmentBackend, ErrorKind};
    use std::collections::BTreeMap;

    struct Fixed(Arc<MemoryExecutionBackend>);

    #[async_trait]
    impl BackendFactory for Fixed {
        async fn connect(&self, _environment: &str, _config: &EnvironmentBackend) -> Result<BackendHandles> {
            Ok(BackendHandles {
                execution: self.0.clone(),
                archive: Arc::new(MemoryArchive::new()),
            })
        }
    }

    fn lifecycle() -> (Lifecycle, Arc<MemoryExecutionBackend>) {
        let backend = Arc::new(MemoryExecutionBackend::new());
        let environments = BTreeMap::from([(
            "test".to_string(),
            EnvironmentBackend {
                event_listener: "http://el.test".to_string(),
                api_server: "http://api.test".to_string(),
                namespace: "tekton-resources".to_string(),
                request_timeout_secs: 5,
                archive: ArchiveConfig { root: "/tmp".into() },
            },
        )]);
        let registry = Arc::new(BackendRegistry::new(environments, Arc::new(Fixed(backend.clone()))));
        (Lifecycle::new(registry), backend)
    }

    #[tokio::test]
    async fn test_create_then_stop_twice() {
        let (lifecycle, backend) = lifecycle();
        let run = RunLabels::new("test-cluster", 3, 42);

        lifecycle
            .create("test", &CreatePayload::new("test-app", 1, &run, "test", "hz"))
            .await
            .unwrap();

        lifecycle.stop("test", "test-cluster", 3, 42).await.unwrap();
        lifecycle.stop("test", "test-cluster", 3, 42).await.unwrap();
        assert!(backend.get(&run).unwrap().cancelled);
        assert_eq!(backend.cancellations(), 1);
    }

    #[tokio::test]
    async fn test_stop_unknown_run_is_ok() {
        let (lifecycle, _) = lifecycle();
        lifecycle.stop("test", "test-cluster", 3, 7).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_environment() {
        let (lifecycle, _) = lifecycle();
        let err = lifecycle.stop("online", "test-cluster", 3, 42).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigNotFound);
        assert_eq!(err.ops(), vec!["lifecycle: stop pipelinerun"]);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let (lifecycle, backend) = lifecycle();
        let run = RunLabels::new("test-cluster", 3, 42);
        let mut payload = CreatePayload::new("test-app", 1, &run, "test", "hz");
        payload.labels.remove(pr_core::labels::LABEL_PIPELINERUN_ID);

        let err = lifecycle.create("test", &payload).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendRejected);
        assert!(backend.get(&run).is_none());
    }
}
