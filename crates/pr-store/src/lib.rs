//! Collaborators the orchestration core reads from.
//!
//! Run metadata, clusters, environment bindings and users live in a
//! relational store owned by other services; source and configuration
//! history live in git. This crate only names the operations the core
//! needs. Absent records are reported as [`pr_core::Error::NotFound`].

use async_trait::async_trait;
use pr_core::{
    Action, Application, ApplicationId, Cluster, ClusterId, EnvironmentRegion, PagedQuery, Result,
    Run, RunId, User, UserId,
};

/// Pipeline run records
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn get_by_id(&self, id: RunId) -> Result<Run>;

    /// Most recent run of `action` for a cluster, if any
    async fn get_latest_by_cluster_and_action(
        &self,
        cluster_id: ClusterId,
        action: Action,
    ) -> Result<Option<Run>>;

    /// One page of a cluster's runs plus the total count, newest first
    async fn get_by_cluster(&self, cluster_id: ClusterId, query: &PagedQuery) -> Result<(usize, Vec<Run>)>;
}

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_by_id(&self, id: ClusterId) -> Result<Cluster>;
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn get_by_id(&self, id: ApplicationId) -> Result<Application>;
}

#[async_trait]
pub trait EnvironmentRegionStore: Send + Sync {
    async fn get_by_id(&self, id: u64) -> Result<EnvironmentRegion>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<User>;
}

/// A commit as reported by source control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub message: String,
}

/// Source-control lookups
#[async_trait]
pub trait CommitGetter: Send + Sync {
    /// Fetch a commit by id, optionally scoped to a branch or tag
    async fn get_commit(&self, git_url: &str, git_ref: Option<&str>, commit_id: &str) -> Result<Commit>;
}

/// Per-cluster configuration repository
#[async_trait]
pub trait ConfigRepo: Send + Sync {
    /// Textual diff of a cluster's configuration between two commits
    async fn compare_config(
        &self,
        application: &str,
        cluster: &str,
        from: &str,
        to: &str,
    ) -> Result<String>;
}

/// In-memory collaborators for testing
pub mod memory;

pub use memory::MemoryStore;
