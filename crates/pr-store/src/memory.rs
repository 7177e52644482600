//! In-memory collaborators for testing.

use async_trait::async_trait;
use pr_core::{
    Action, Application, ApplicationId, Cluster, ClusterId, EnvironmentRegion, Error, PagedQuery,
    Result, Run, RunId, User, UserId,
};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::{
    ApplicationStore, ClusterStore, Commit, CommitGetter, ConfigRepo, EnvironmentRegionStore,
    RunStore, UserStore,
};

type ConfigKey = (String, String, String, String);

/// Implements every collaborator trait over plain maps.
pub struct MemoryStore {
    runs: RwLock<HashMap<RunId, Run>>,
    clusters: RwLock<HashMap<ClusterId, Cluster>>,
    applications: RwLock<HashMap<ApplicationId, Application>>,
    regions: RwLock<HashMap<u64, EnvironmentRegion>>,
    users: RwLock<HashMap<UserId, User>>,
    commits: RwLock<HashMap<(String, String), Commit>>,
    config_diffs: RwLock<HashMap<ConfigKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            clusters: RwLock::new(HashMap::new()),
            applications: RwLock::new(HashMap::new()),
            regions: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            commits: RwLock::new(HashMap::new()),
            config_diffs: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert_run(&self, run: Run) {
        self.runs.write().unwrap().insert(run.id, run);
    }

    pub fn insert_cluster(&self, cluster: Cluster) {
        self.clusters.write().unwrap().insert(cluster.id, cluster);
    }

    pub fn insert_application(&self, application: Application) {
        self.applications.write().unwrap().insert(application.id, application);
    }

    pub fn insert_environment_region(&self, region: EnvironmentRegion) {
        self.regions.write().unwrap().insert(region.id, region);
    }

    pub fn remove_environment_region(&self, id: u64) {
        self.regions.write().unwrap().remove(&id);
    }

    pub fn insert_user(&self, user: User) {
        self.users.write().unwrap().insert(user.id, user);
    }

    pub fn insert_commit(&self, git_url: &str, commit: Commit) {
        self.commits
            .write()
            .unwrap()
            .insert((git_url.to_string(), commit.id.clone()), commit);
    }

    pub fn insert_config_diff(&self, application: &str, cluster: &str, from: &str, to: &str, diff: &str) {
        self.config_diffs.write().unwrap().insert(
            (
                application.to_string(),
                cluster.to_string(),
                from.to_string(),
                to.to_string(),
            ),
            diff.to_string(),
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn get_by_id(&self, id: RunId) -> Result<Run> {
        self.runs
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("pipelinerun", id))
    }

    async fn get_latest_by_cluster_and_action(
        &self,
        cluster_id: ClusterId,
        action: Action,
    ) -> Result<Option<Run>> {
        let runs = self.runs.read().unwrap();
        Ok(runs
            .values()
            .filter(|r| r.cluster_id == cluster_id && r.action == action)
            .max_by_key(|r| r.id)
            .cloned())
    }

    async fn get_by_cluster(&self, cluster_id: ClusterId, query: &PagedQuery) -> Result<(usize, Vec<Run>)> {
        let runs = self.runs.read().unwrap();
        let mut matching: Vec<&Run> = runs.values().filter(|r| r.cluster_id == cluster_id).collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .cloned()
            .collect();
        Ok((total, page))
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_by_id(&self, id: ClusterId) -> Result<Cluster> {
        self.clusters
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("cluster", id))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn get_by_id(&self, id: ApplicationId) -> Result<Application> {
        self.applications
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("application", id))
    }
}

#[async_trait]
impl EnvironmentRegionStore for MemoryStore {
    async fn get_by_id(&self, id: u64) -> Result<EnvironmentRegion> {
        self.regions
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("environment region", id))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: UserId) -> Result<User> {
        self.users
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("user", id))
    }
}

#[async_trait]
impl CommitGetter for MemoryStore {
    async fn get_commit(&self, git_url: &str, _git_ref: Option<&str>, commit_id: &str) -> Result<Commit> {
        self.commits
            .read()
            .unwrap()
            .get(&(git_url.to_string(), commit_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("commit", format!("{}@{}", git_url, commit_id)))
    }
}

#[async_trait]
impl ConfigRepo for MemoryStore {
    async fn compare_config(
        &self,
        application: &str,
        cluster: &str,
        from: &str,
        to: &str,
    ) -> Result<String> {
        let key = (
            application.to_string(),
            cluster.to_string(),
            from.to_string(),
            to.to_string(),
        );
        self.config_diffs
            .read()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found("config diff", format!("{}/{} {}..{}", application, cluster, from, to)))
    }
}
