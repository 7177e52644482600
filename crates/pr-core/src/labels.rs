//! Run identity encoding.
//!
//! Execution backends know nothing about platform run ids. A run is found
//! again by the labels it was created with, so creation, stop and log
//! streaming all derive them through [`RunLabels`].
//!
//! | label                              | value              |
//! |------------------------------------|--------------------|
//! | `pipelinerun.dev/cluster`          | cluster name       |
//! | `pipelinerun.dev/cluster-id`       | numeric cluster id |
//! | `pipelinerun.dev/pipelinerun-id`   | numeric run id     |
//! | `pipelinerun.dev/application`      | creation only      |

use std::collections::BTreeMap;

use crate::{ClusterId, RunId};

pub const LABEL_CLUSTER: &str = "pipelinerun.dev/cluster";
pub const LABEL_CLUSTER_ID: &str = "pipelinerun.dev/cluster-id";
pub const LABEL_PIPELINERUN_ID: &str = "pipelinerun.dev/pipelinerun-id";
pub const LABEL_APPLICATION: &str = "pipelinerun.dev/application";

/// Backend-side identity of one platform run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunLabels {
    cluster: String,
    cluster_id: ClusterId,
    run_id: RunId,
}

impl RunLabels {
    pub fn new(cluster: impl Into<String>, cluster_id: ClusterId, run_id: RunId) -> Self {
        Self {
            cluster: cluster.into(),
            cluster_id,
            run_id,
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Identity labels, keyed in sorted order.
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_CLUSTER.to_string(), self.cluster.clone()),
            (LABEL_CLUSTER_ID.to_string(), self.cluster_id.to_string()),
            (LABEL_PIPELINERUN_ID.to_string(), self.run_id.to_string()),
        ])
    }

    /// Identity labels plus the owning application, as set at creation.
    pub fn creation_labels(&self, application: &str) -> BTreeMap<String, String> {
        let mut labels = self.labels();
        labels.insert(LABEL_APPLICATION.to_string(), application.to_string());
        labels
    }

    /// Label selector (`k=v,k=v`) matching exactly this run.
    pub fn selector(&self) -> String {
        self.labels()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Backend object name. The two trailing segments are numeric, so
    /// cluster names containing `-` stay unambiguous.
    pub fn object_name(&self) -> String {
        format!("{}-{}-{}", self.cluster, self.cluster_id, self.run_id)
    }

    /// True if every identity label is present with the same value.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels()
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_deterministic() {
        let labels = RunLabels::new("test-cluster", 3, 42);
        assert_eq!(
            labels.selector(),
            "pipelinerun.dev/cluster=test-cluster,pipelinerun.dev/cluster-id=3,pipelinerun.dev/pipelinerun-id=42"
        );
        assert_eq!(labels.selector(), RunLabels::new("test-cluster", 3, 42).selector());
        assert_eq!(labels.object_name(), "test-cluster-3-42");
    }

    #[test]
    fn test_creation_labels_match_lookup() {
        let labels = RunLabels::new("test-cluster", 3, 42);
        let created = labels.creation_labels("test-app");
        assert_eq!(created.get(LABEL_APPLICATION).unwrap(), "test-app");
        assert!(labels.matches(&created));
    }

    #[test]
    fn test_distinct_runs_do_not_match() {
        let run1 = RunLabels::new("test1", 1, 1);
        let other_run = RunLabels::new("test1", 1, 11);
        let other_cluster = RunLabels::new("test1-1", 1, 1);

        assert!(!run1.matches(&other_run.labels()));
        assert!(!run1.matches(&other_cluster.labels()));
        assert_ne!(run1.object_name(), other_run.object_name());
    }
}
