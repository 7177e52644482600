//! Construction of backend handles from environment configuration.

use std::sync::Arc;

use async_trait::async_trait;
use pr_core::{EnvironmentBackend, Error, Result};
use tracing::info;

use crate::{BackendHandles, FsArchive, HttpExecutionBackend};

/// Builds the handles for one environment. Called by the registry at most
/// once per environment until the handle is invalidated.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn connect(&self, environment: &str, config: &EnvironmentBackend) -> Result<BackendHandles>;
}

/// HTTP execution backend plus filesystem archive
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn connect(&self, environment: &str, config: &EnvironmentBackend) -> Result<BackendHandles> {
        let connection_error = |reason: String| Error::Connection {
            environment: environment.to_string(),
            reason,
        };

        let execution = HttpExecutionBackend::new(config).map_err(|e| connection_error(e.to_string()))?;

        let root = &config.archive.root;
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|e| connection_error(format!("archive root {}: {}", root.display(), e)))?;
        if !metadata.is_dir() {
            return Err(connection_error(format!(
                "archive root {} is not a directory",
                root.display()
            )));
        }

        info!(
            environment,
            api_server = %config.api_server,
            archive = %root.display(),
            "Connected backend"
        );
        Ok(BackendHandles {
            execution: Arc::new(execution),
            archive: Arc::new(FsArchive::new(root.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_core::{ArchiveConfig, ErrorKind};

    fn config(root: std::path::PathBuf) -> EnvironmentBackend {
        EnvironmentBackend {
            event_listener: "http://127.0.0.1:1".to_string(),
            api_server: "http://127.0.0.1:1".to_string(),
            namespace: "tekton-resources".to_string(),
            request_timeout_secs: 1,
            archive: ArchiveConfig { root },
        }
    }

    #[tokio::test]
    async fn test_connect_with_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        DefaultBackendFactory
            .connect("test", &config(dir.path().to_path_buf()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_archive_root_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DefaultBackendFactory
            .connect("test", &config(dir.path().join("missing")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.to_string().contains("\"test\""));
    }
}
