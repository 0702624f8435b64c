//! Local filesystem adapter for the `FileStore` port.
//!
//! Tree operations run on the blocking pool; everything else goes through
//! `tokio::fs` directly.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task;

use crate::domain::errors::{RunError, RunResult};
use crate::domain::ports::FileStore;

#[derive(Debug, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

async fn run_blocking<T, F>(op: F) -> RunResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    task::spawn_blocking(op)
        .await
        .map_err(|e| RunError::Storage(format!("blocking file task failed: {e}")))?
        .map_err(RunError::from)
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_directory(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    async fn list(&self, dir: &Path) -> RunResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    async fn read(&self, path: &Path) -> RunResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, contents: &str) -> RunResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn copy_tree(&self, from: &Path, to: &Path) -> RunResult<()> {
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        run_blocking(move || copy_dir_recursive(&from, &to)).await
    }

    async fn move_tree(&self, from: &Path, to: &Path) -> RunResult<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::rename(from, to).await {
            Ok(()) => Ok(()),
            // rename fails across filesystems
            Err(_) => {
                let (from, to) = (from.to_path_buf(), to.to_path_buf());
                run_blocking(move || {
                    copy_dir_recursive(&from, &to)?;
                    std::fs::remove_dir_all(&from)
                })
                .await
            }
        }
    }

    async fn delete_tree(&self, path: &Path) -> RunResult<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(unix)]
    async fn chmod(&self, path: &Path, mode: u32) -> RunResult<()> {
        use std::os::unix::fs::PermissionsExt;
        Ok(tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?)
    }

    #[cfg(not(unix))]
    async fn chmod(&self, _path: &Path, _mode: u32) -> RunResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_nested_trees() {
        let store = LocalFileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("bin")).unwrap();
        std::fs::write(src.join("top.txt"), "top").unwrap();
        std::fs::write(src.join("bin/agent.sh"), "#!/bin/sh").unwrap();

        let dst = dir.path().join("dst");
        store.copy_tree(&src, &dst).await.unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert!(dst.join("bin/agent.sh").is_file());
    }

    #[tokio::test]
    async fn deleting_a_missing_tree_is_fine() {
        let store = LocalFileStore::new();
        let dir = tempfile::tempdir().unwrap();
        store.delete_tree(&dir.path().join("nope")).await.unwrap();
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let store = LocalFileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        store.write(&path, "hello").await.unwrap();
        assert_eq!(store.read(&path).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn move_tree_relocates_contents() {
        let store = LocalFileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("f.txt"), "x").unwrap();

        let dst = dir.path().join("sub/dst");
        store.move_tree(&src, &dst).await.unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dst.join("f.txt")).unwrap(), "x");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn chmod_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let store = LocalFileStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.sh");
        std::fs::write(&path, "#!/bin/sh").unwrap();

        store.chmod(&path, 0o755).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
