//! Flat-file archive store.
//!
//! Writes land in a temp file next to the target and are renamed into place,
//! so a retried write either fully replaces the file or leaves it untouched.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use uuid::Uuid;

use curator_shared::{CuratorError, Result};

use crate::FileStore;

/// File store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| CuratorError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store-relative path, rejecting anything that could escape the root.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let safe = !path.as_os_str().is_empty()
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(CuratorError::validation(format!(
                "file store path must be relative and plain: {}",
                path.display()
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    #[instrument(skip_all, fields(path = %path.display(), bytes = bytes.len()))]
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        let dir = target.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CuratorError::io(&dir, e))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::now_v7()));

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| CuratorError::io(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CuratorError::io(&target, e));
        }

        debug!("file written");
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CuratorError::io(&target, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> LocalFileStore {
        let root = std::env::temp_dir().join(format!("curator-files-{}", Uuid::now_v7()));
        LocalFileStore::open(root).expect("open store")
    }

    #[tokio::test]
    async fn write_read_roundtrip() {
        let store = test_store();
        let path = Path::new("ch1.txt");

        assert_eq!(store.read(path).await.unwrap(), None);

        store.write(path, b"Chapter One\n\nHello").await.unwrap();
        assert_eq!(
            store.read(path).await.unwrap().as_deref(),
            Some(b"Chapter One\n\nHello".as_slice())
        );

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn rewrite_replaces_and_leaves_no_temp_files() {
        let store = test_store();
        let path = Path::new("ch1.txt");
        store.write(path, b"first").await.unwrap();
        store.write(path, b"second").await.unwrap();

        assert_eq!(store.read(path).await.unwrap().unwrap(), b"second");
        let entries: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let store = test_store();
        for bad in ["../outside.txt", "/etc/passwd", "", "./x.txt"] {
            let result = store.write(Path::new(bad), b"x").await;
            assert!(result.is_err(), "{bad:?} should be rejected");
        }
        let _ = std::fs::remove_dir_all(store.root());
    }
}
