//! Entry point for API callers: logs, diffs, summaries and lifecycle of
//! pipeline runs, addressed by platform ids.

use std::collections::HashMap;
use std::sync::Arc;

use pr_backend::{BackendRegistry, CreatePayload, EventId};
use pr_core::{
    Action, Cluster, ClusterId, DiffResult, EnvironmentRegion, Error, LogResult, PagedQuery,
    PlatformConfig, Result, ResultExt, Run, RunId, RunLabels, RunSummary, UserId, UserInfo,
};
use pr_store::{
    ApplicationStore, ClusterStore, CommitGetter, ConfigRepo, EnvironmentRegionStore, MemoryStore,
    RunStore, UserStore,
};
use tracing::{info, instrument};

use crate::{DiffComputer, Lifecycle, LogService};

/// Everything the controller reads from outside the orchestration core
#[derive(Clone)]
pub struct Collaborators {
    pub runs: Arc<dyn RunStore>,
    pub clusters: Arc<dyn ClusterStore>,
    pub applications: Arc<dyn ApplicationStore>,
    pub regions: Arc<dyn EnvironmentRegionStore>,
    pub users: Arc<dyn UserStore>,
    pub commits: Arc<dyn CommitGetter>,
    pub config_repo: Arc<dyn ConfigRepo>,
}

impl Collaborators {
    /// All collaborators served by one in-memory store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            runs: store.clone(),
            clusters: store.clone(),
            applications: store.clone(),
            regions: store.clone(),
            users: store.clone(),
            commits: store.clone(),
            config_repo: store,
        }
    }
}

pub struct Controller {
    runs: Arc<dyn RunStore>,
    clusters: Arc<dyn ClusterStore>,
    applications: Arc<dyn ApplicationStore>,
    regions: Arc<dyn EnvironmentRegionStore>,
    users: Arc<dyn UserStore>,
    lifecycle: Lifecycle,
    logs: LogService,
    diffs: DiffComputer,
}

impl Controller {
    pub fn new(collaborators: Collaborators, registry: Arc<BackendRegistry>, config: &PlatformConfig) -> Self {
        Self {
            runs: collaborators.runs,
            clusters: collaborators.clusters,
            applications: collaborators.applications,
            regions: collaborators.regions,
            users: collaborators.users,
            lifecycle: Lifecycle::new(registry.clone()),
            logs: LogService::new(registry, config.log.channel_capacity),
            diffs: DiffComputer::new(collaborators.commits, collaborators.config_repo, config.git.clone()),
        }
    }

    /// Cluster of a run and the environment binding active for it now
    async fn placement(&self, cluster_id: ClusterId) -> Result<(Cluster, EnvironmentRegion)> {
        let cluster = self.clusters.get_by_id(cluster_id).await?;
        let region = self.regions.get_by_id(cluster.environment_region_id).await?;
        Ok((cluster, region))
    }

    #[instrument(skip(self))]
    pub async fn get_pipelinerun_log(&self, run_id: RunId) -> Result<LogResult> {
        const OP: &str = "pipelinerun controller: get pipelinerun log";

        let run = self.runs.get_by_id(run_id).await.op(OP)?;
        let (cluster, region) = self.placement(run.cluster_id).await.op(OP)?;
        self.logs
            .get_log(&run, &cluster, &region.environment_name)
            .await
            .op(OP)
    }

    /// Log of the cluster's most recent build-deploy run. A cluster that
    /// was never built is an error.
    #[instrument(skip(self))]
    pub async fn get_cluster_latest_log(&self, cluster_id: ClusterId) -> Result<LogResult> {
        const OP: &str = "pipelinerun controller: get cluster latest log";

        let run = self
            .runs
            .get_latest_by_cluster_and_action(cluster_id, Action::BuildDeploy)
            .await
            .op(OP)?
            .ok_or_else(|| Error::not_found("builddeploy pipelinerun of cluster", cluster_id).op(OP))?;
        let (cluster, region) = self.placement(cluster_id).await.op(OP)?;
        self.logs
            .get_log(&run, &cluster, &region.environment_name)
            .await
            .op(OP)
    }

    #[instrument(skip(self))]
    pub async fn get_diff(&self, run_id: RunId) -> Result<DiffResult> {
        const OP: &str = "pipelinerun controller: get pipelinerun diff";

        let run = self.runs.get_by_id(run_id).await.op(OP)?;
        let cluster = self.clusters.get_by_id(run.cluster_id).await.op(OP)?;
        let application = self.applications.get_by_id(cluster.application_id).await.op(OP)?;
        self.diffs.get_diff(&run, &cluster, &application).await.op(OP)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, run_id: RunId) -> Result<RunSummary> {
        const OP: &str = "pipelinerun controller: get pipelinerun basic";

        let run = self.runs.get_by_id(run_id).await.op(OP)?;
        let user = self.users.get_by_id(run.created_by).await.op(OP)?;
        Ok(RunSummary::new(
            &run,
            UserInfo {
                user_id: user.id,
                user_name: user.name,
            },
        ))
    }

    /// One page of a cluster's runs, in the order the run store returns them.
    #[instrument(skip(self))]
    pub async fn list(&self, cluster_id: ClusterId, query: &PagedQuery) -> Result<(usize, Vec<RunSummary>)> {
        const OP: &str = "pipelinerun controller: list pipelinerun";

        let (total, runs) = self.runs.get_by_cluster(cluster_id, query).await.op(OP)?;
        let summaries = self.summaries(&runs).await.op(OP)?;
        Ok((total, summaries))
    }

    async fn summaries(&self, runs: &[Run]) -> Result<Vec<RunSummary>> {
        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut summaries = Vec::with_capacity(runs.len());
        for run in runs {
            let name = match names.get(&run.created_by) {
                Some(name) => name.clone(),
                None => {
                    let user = self.users.get_by_id(run.created_by).await?;
                    names.insert(user.id, user.name.clone());
                    user.name
                }
            };
            summaries.push(RunSummary::new(
                run,
                UserInfo {
                    user_id: run.created_by,
                    user_name: name,
                },
            ));
        }
        Ok(summaries)
    }

    /// Cancel a run on its cluster's backend. Stopping a finished run is a no-op.
    #[instrument(skip(self))]
    pub async fn stop_pipelinerun(&self, run_id: RunId) -> Result<()> {
        const OP: &str = "pipelinerun controller: stop pipelinerun";

        let run = self.runs.get_by_id(run_id).await.op(OP)?;
        let (cluster, region) = self.placement(run.cluster_id).await.op(OP)?;
        self.lifecycle
            .stop(&region.environment_name, &cluster.name, cluster.id, run.id)
            .await
            .op(OP)?;
        info!(run_id, cluster = %cluster.name, "Stopped pipelinerun");
        Ok(())
    }

    /// Submit a recorded run to its cluster's backend with the given pipeline spec.
    #[instrument(skip(self, pipeline))]
    pub async fn create_pipelinerun(&self, run_id: RunId, pipeline: serde_json::Value) -> Result<EventId> {
        const OP: &str = "pipelinerun controller: create pipelinerun";

        let run = self.runs.get_by_id(run_id).await.op(OP)?;
        let (cluster, region) = self.placement(run.cluster_id).await.op(OP)?;
        let application = self.applications.get_by_id(cluster.application_id).await.op(OP)?;

        let labels = RunLabels::new(cluster.name.clone(), cluster.id, run.id);
        let mut payload = CreatePayload::new(
            &application.name,
            application.id,
            &labels,
            &region.environment_name,
            &region.region_name,
        );
        payload.git_url = run.git_url.clone();
        payload.git_branch = run.git_branch.clone();
        payload.git_commit = run.git_commit.clone();
        payload.pipeline = pipeline;

        self.lifecycle
            .create(&region.environment_name, &payload)
            .await
            .op(OP)
    }
}
