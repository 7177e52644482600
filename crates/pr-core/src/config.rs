//! Platform configuration: per-environment backends and git link rules.
//!
//! ## Backends file (`~/.config/pipelinerun/backends.toml`)
//!
//! ```toml
//! [git]
//! internal_ssh_prefix = "ssh://git@git.internal:22222"
//! internal_http_prefix = "https://git.internal"
//! commit_history_path = "/-/commits/"
//!
//! [log]
//! channel_capacity = 256
//!
//! [environments.test]
//! event_listener = "http://el-pipelines.test.svc:8080"
//! api_server = "http://pipelines-api.test.svc:8081"
//! namespace = "tekton-resources"
//!
//! [environments.test.archive]
//! root = "/var/lib/pipelinerun/logs/test"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Backends keyed by environment name.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentBackend>,
}

/// Rules for turning internal git remotes into browsable commit links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_ssh_prefix")]
    pub internal_ssh_prefix: String,

    #[serde(default = "default_http_prefix")]
    pub internal_http_prefix: String,

    /// Path inserted between the repository URL and the commit id.
    #[serde(default = "default_history_path")]
    pub commit_history_path: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            internal_ssh_prefix: default_ssh_prefix(),
            internal_http_prefix: default_http_prefix(),
            commit_history_path: default_history_path(),
        }
    }
}

fn default_ssh_prefix() -> String {
    "ssh://git@git.internal:22222".to_string()
}

fn default_http_prefix() -> String {
    "https://git.internal".to_string()
}

fn default_history_path() -> String {
    "/-/commits/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Capacity of the bounded live-log line channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

/// Execution cluster and log archive for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentBackend {
    /// Trigger endpoint that accepts create payloads
    pub event_listener: String,

    /// REST endpoint for querying, cancelling and streaming runs
    pub api_server: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory holding archived log objects
    pub root: PathBuf,
}

fn default_namespace() -> String {
    "tekton-resources".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl PlatformConfig {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not find config directory".to_string()))?;
        Self::load_from(&config_dir.join("pipelinerun/backends.toml"))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentBackend> {
        self.environments.get(name)
    }
}
