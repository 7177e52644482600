//! Code and configuration changes carried by a run.

use serde::{Deserialize, Serialize};

use crate::GitConfig;

/// Source change a run built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInfo {
    pub branch: String,
    pub commit_id: String,
    pub commit_msg: String,
    /// Commit history page, only for internal repositories
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub link: String,
}

/// Configuration change a run deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDiff {
    pub from: String,
    pub to: String,
    pub diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub code_info: Option<CodeInfo>,
    pub config_diff: Option<ConfigDiff>,
}

impl GitConfig {
    /// HTTP form of an internal SSH remote, without the `.git` suffix.
    /// `None` for remotes outside the internal server.
    pub fn internal_http_url(&self, git_url: &str) -> Option<String> {
        let path = git_url.strip_prefix(&self.internal_ssh_prefix)?;
        let path = path.strip_suffix(".git").unwrap_or(path);
        Some(format!("{}{}", self.internal_http_prefix, path))
    }

    /// Link to the commit history page, or empty for external remotes.
    pub fn commit_history_link(&self, git_url: &str, commit: &str) -> String {
        match self.internal_http_url(git_url) {
            Some(http_url) => format!("{}{}{}", http_url, self.commit_history_path, commit),
            None => String::new(),
        }
    }
}
