//! Per-walk scratch directory, removed on every exit path.

use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A uniquely named directory holding one walk's temporary files.
///
/// Dropping the guard deletes the directory, so early returns and panics
/// never leave mezzanines or rejected rung outputs behind.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Creates `root/<uuid>`.
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory now instead of at drop.
    pub async fn cleanup(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "Scratch cleanup failed");
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path()).await.unwrap();
            tokio::fs::write(scratch.path().join("rung-0.mp4"), b"data")
                .await
                .unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_directory() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        scratch.cleanup().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let root = TempDir::new().unwrap();
        let a = ScratchDir::create(root.path()).await.unwrap();
        let b = ScratchDir::create(root.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
    }
}
