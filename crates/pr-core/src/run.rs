//! Pipeline run records and summaries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RunId = u64;
pub type ClusterId = u64;
pub type ApplicationId = u64;
pub type UserId = u64;

/// Kind of operation a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Build an image and deploy it; the only action that produces logs
    #[serde(rename = "builddeploy")]
    BuildDeploy,
    Deploy,
    Restart,
    Rollback,
}

impl Action {
    pub fn produces_logs(self) -> bool {
        matches!(self, Action::BuildDeploy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::BuildDeploy => "builddeploy",
            Action::Deploy => "deploy",
            Action::Restart => "restart",
            Action::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status as last recorded by the status watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Ok,
    Failed,
    Cancelled,
    Unknown,
}

/// One execution of a pipeline for a cluster.
///
/// Owned by the run store. Orchestration only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub cluster_id: ClusterId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub action: Action,
    pub status: RunStatus,

    #[serde(default)]
    pub git_url: String,
    #[serde(default)]
    pub git_branch: String,
    #[serde(default)]
    pub git_commit: String,
    #[serde(default)]
    pub image_url: String,

    /// Configuration commit the cluster was on before this run
    #[serde(default)]
    pub last_config_commit: String,
    /// Configuration commit this run deployed
    #[serde(default)]
    pub config_commit: String,

    /// Archive object holding the log once the run has been collected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_object: Option<String>,
    /// Archive object holding the raw backend run object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_object: Option<String>,

    pub created_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(id: RunId, cluster_id: ClusterId, action: Action, created_by: UserId) -> Self {
        Self {
            id,
            cluster_id,
            title: String::new(),
            description: String::new(),
            action,
            status: RunStatus::Created,
            git_url: String::new(),
            git_branch: String::new(),
            git_commit: String::new(),
            image_url: String::new(),
            last_config_commit: String::new(),
            config_commit: String::new(),
            log_object: None,
            pr_object: None,
            created_by,
            started_at: None,
            finished_at: None,
        }
    }

    /// Archived log reference, treating an empty string as unset
    pub fn archived_log(&self) -> Option<&str> {
        self.log_object.as_deref().filter(|o| !o.is_empty())
    }
}

/// Page selection for list queries. `page_number` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedQuery {
    pub page_number: usize,
    pub page_size: usize,
}

impl Default for PagedQuery {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 20,
        }
    }
}

impl PagedQuery {
    pub fn new(page_number: usize, page_size: usize) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    pub fn offset(&self) -> usize {
        self.page_number.saturating_sub(1) * self.page_size
    }

    pub fn limit(&self) -> usize {
        self.page_size
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: UserId,
    pub user_name: String,
}

/// A run joined with its creator, as returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: RunId,
    pub title: String,
    pub description: String,
    pub action: Action,
    pub status: RunStatus,
    pub git_url: String,
    pub git_branch: String,
    pub git_commit: String,
    pub image_url: String,
    pub last_config_commit: String,
    pub config_commit: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_by: UserInfo,
}

impl RunSummary {
    pub fn new(run: &Run, created_by: UserInfo) -> Self {
        Self {
            id: run.id,
            title: run.title.clone(),
            description: run.description.clone(),
            action: run.action,
            status: run.status,
            git_url: run.git_url.clone(),
            git_branch: run.git_branch.clone(),
            git_commit: run.git_commit.clone(),
            image_url: run.image_url.clone(),
            last_config_commit: run.last_config_commit.clone(),
            config_commit: run.config_commit.clone(),
            started_at: run.started_at,
            finished_at: run.finished_at,
            created_by,
        }
    }
}
