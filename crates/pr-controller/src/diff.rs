//! Code and configuration diffs of a run.

use std::sync::Arc;

use pr_core::{Application, CodeInfo, Cluster, ConfigDiff, DiffResult, GitConfig, Result, ResultExt, Run};
use pr_store::{CommitGetter, ConfigRepo};
use tracing::instrument;

pub struct DiffComputer {
    commits: Arc<dyn CommitGetter>,
    config_repo: Arc<dyn ConfigRepo>,
    git: GitConfig,
}

impl DiffComputer {
    pub fn new(commits: Arc<dyn CommitGetter>, config_repo: Arc<dyn ConfigRepo>, git: GitConfig) -> Self {
        Self {
            commits,
            config_repo,
            git,
        }
    }

    /// Either half is absent when the run carries no matching commit data.
    /// Any lookup failure fails the whole diff.
    #[instrument(skip_all, fields(run_id = run.id, cluster = %cluster.name))]
    pub async fn get_diff(&self, run: &Run, cluster: &Cluster, application: &Application) -> Result<DiffResult> {
        const OP: &str = "diff: get pipelinerun diff";

        let mut code_info = None;
        if !run.git_url.is_empty() && !run.git_commit.is_empty() && !run.git_branch.is_empty() {
            let commit = self
                .commits
                .get_commit(&run.git_url, None, &run.git_commit)
                .await
                .op(OP)?;
            code_info = Some(CodeInfo {
                branch: run.git_branch.clone(),
                commit_id: run.git_commit.clone(),
                commit_msg: commit.message,
                link: self.git.commit_history_link(&run.git_url, &run.git_commit),
            });
        }

        let mut config_diff = None;
        if !run.config_commit.is_empty() && !run.last_config_commit.is_empty() {
            let diff = self
                .config_repo
                .compare_config(
                    &application.name,
                    &cluster.name,
                    &run.last_config_commit,
                    &run.config_commit,
                )
                .await
                .op(OP)?;
            config_diff = Some(ConfigDiff {
                from: run.last_config_commit.clone(),
                to: run.config_commit.clone(),
                diff,
            });
        }

        Ok(DiffResult {
            code_info,
            config_diff,
        })
    }
}
