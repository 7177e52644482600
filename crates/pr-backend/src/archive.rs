//! Filesystem log archive.
//!
//! Objects are relative paths under the archive root, e.g. `logs/7.txt`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use pr_core::{Error, Result};

use crate::ArchiveBackend;

pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve an object name to a path that cannot escape the root
    fn object_path(&self, object: &str) -> Result<PathBuf> {
        let relative = Path::new(object);
        let is_plain = !object.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(Error::BackendRejected(format!("invalid log object {:?}", object)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArchiveBackend for FsArchive {
    async fn read_log(&self, object: &str) -> Result<Vec<u8>> {
        let path = self.object_path(object)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("log object", object)),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_core::ErrorKind;

    #[tokio::test]
    async fn test_read_archived_object() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("logs/7.txt"), b"hello").unwrap();

        let archive = FsArchive::new(dir.path().to_path_buf());
        assert_eq!(archive.read_log("logs/7.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path().to_path_buf());
        let err = archive.read_log("logs/8.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path().join("archive"));

        for object in ["../secret", "/etc/passwd", "logs/../../x", ""] {
            let err = archive.read_log(object).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BackendRejected, "object {:?}", object);
        }
    }
}
