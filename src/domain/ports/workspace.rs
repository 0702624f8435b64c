//! File storage port.
//!
//! All working-area and archive mutation goes through this seam. Each run
//! owns a uniquely named working directory, so no locking happens here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::errors::RunResult;

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    async fn is_directory(&self, path: &Path) -> bool;

    /// Entries of a directory, non-recursive.
    async fn list(&self, dir: &Path) -> RunResult<Vec<PathBuf>>;

    async fn read(&self, path: &Path) -> RunResult<String>;

    /// Write, creating parent directories as needed.
    async fn write(&self, path: &Path, contents: &str) -> RunResult<()>;

    /// Recursively copy a directory tree.
    async fn copy_tree(&self, from: &Path, to: &Path) -> RunResult<()>;

    /// Move a directory tree, falling back to copy-and-delete across
    /// filesystems.
    async fn move_tree(&self, from: &Path, to: &Path) -> RunResult<()>;

    /// Remove a tree; removing a missing path is not an error.
    async fn delete_tree(&self, path: &Path) -> RunResult<()>;

    async fn chmod(&self, path: &Path, mode: u32) -> RunResult<()>;
}
