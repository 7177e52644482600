//! Execution and archive backends.
//!
//! Every environment has one execution backend (the pipeline scheduler
//! running on that environment's cluster) and one archive holding logs of
//! collected runs. [`BackendRegistry`] owns the handles to both and hands
//! them out by environment name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use pr_core::{ApplicationId, Error, LogLine, Result, RunId, RunLabels};
use serde::{Deserialize, Serialize};

/// Identifier the backend returns for an accepted create request
pub type EventId = String;

/// Log lines of one run in backend emission order
pub type LogLineStream = BoxStream<'static, Result<LogLine>>;

/// Request to materialize a new run on an execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayload {
    pub application: String,
    #[serde(rename = "applicationID")]
    pub application_id: ApplicationId,
    pub cluster: String,
    #[serde(rename = "clusterID")]
    pub cluster_id: u64,
    pub environment: String,
    pub region: String,
    #[serde(rename = "pipelinerunID")]
    pub pipelinerun_id: RunId,
    #[serde(default)]
    pub git_url: String,
    #[serde(default)]
    pub git_branch: String,
    #[serde(default)]
    pub git_commit: String,
    /// Labels the backend must stamp on the run object
    pub labels: BTreeMap<String, String>,
    /// Pipeline spec to run
    #[serde(default)]
    pub pipeline: serde_json::Value,
}

impl CreatePayload {
    pub fn new(
        application: &str,
        application_id: ApplicationId,
        run: &RunLabels,
        environment: &str,
        region: &str,
    ) -> Self {
        Self {
            application: application.to_string(),
            application_id,
            cluster: run.cluster().to_string(),
            cluster_id: run.cluster_id(),
            environment: environment.to_string(),
            region: region.to_string(),
            pipelinerun_id: run.run_id(),
            git_url: String::new(),
            git_branch: String::new(),
            git_commit: String::new(),
            labels: run.creation_labels(application),
            pipeline: serde_json::Value::Null,
        }
    }

    /// Identity this payload will be found by after creation
    pub fn run_labels(&self) -> RunLabels {
        RunLabels::new(self.cluster.clone(), self.cluster_id, self.pipelinerun_id)
    }

    /// Reject payloads the backend could never correlate back to a run.
    pub fn validate(&self) -> Result<()> {
        if self.application.is_empty() {
            return Err(Error::BackendRejected("payload has no application".to_string()));
        }
        if self.cluster.is_empty() {
            return Err(Error::BackendRejected("payload has no cluster".to_string()));
        }
        let expected = self.run_labels().creation_labels(&self.application);
        let mismatched: Vec<&str> = expected
            .iter()
            .filter(|(k, v)| self.labels.get(*k) != Some(*v))
            .map(|(k, _)| k.as_str())
            .collect();
        if !mismatched.is_empty() {
            return Err(Error::BackendRejected(format!(
                "payload labels disagree with run identity: {}",
                mismatched.join(", ")
            )));
        }
        Ok(())
    }
}

/// Pipeline scheduler of one environment
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Submit a new run, returning the backend's event id
    async fn create(&self, payload: &CreatePayload) -> Result<EventId>;

    /// Cancel the run with these labels. Absent or finished runs are not an error.
    async fn stop(&self, run: &RunLabels) -> Result<()>;

    /// Open a follow-mode log read for the run with these labels
    async fn stream_log(&self, run: &RunLabels) -> Result<LogLineStream>;
}

/// Cold storage of collected run logs
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    async fn read_log(&self, object: &str) -> Result<Vec<u8>>;
}

/// Handles for one environment, shared by every caller
#[derive(Clone)]
pub struct BackendHandles {
    pub execution: Arc<dyn ExecutionBackend>,
    pub archive: Arc<dyn ArchiveBackend>,
}

pub mod archive;
pub mod factory;
pub mod http;
pub mod memory;
pub mod registry;

pub use archive::FsArchive;
pub use factory::{BackendFactory, DefaultBackendFactory};
pub use http::HttpExecutionBackend;
pub use memory::{MemoryArchive, MemoryExecutionBackend};
pub use registry::BackendRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use pr_core::ErrorKind;

    #[test]
    fn test_payload_carries_run_identity() {
        let run = RunLabels::new("test-cluster", 3, 42);
        let payload = CreatePayload::new("app", 1, &run, "test", "hz");
        assert_eq!(payload.run_labels(), run);
        assert!(run.matches(&payload.labels));
        payload.validate().unwrap();

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["application"], "app");
        assert_eq!(json["pipelinerunID"], 42);
        assert_eq!(json["clusterID"], 3);
    }

    #[test]
    fn test_validate_rejects_drifted_labels() {
        let run = RunLabels::new("test-cluster", 3, 42);
        let mut payload = CreatePayload::new("app", 1, &run, "test", "hz");
        payload.pipelinerun_id = 43;
        let err = payload.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendRejected);

        let mut payload = CreatePayload::new("", 1, &run, "test", "hz");
        payload.labels.clear();
        assert_eq!(payload.validate().unwrap_err().kind(), ErrorKind::BackendRejected);
    }
}
