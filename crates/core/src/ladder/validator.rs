//! Output validation: does an encoded artifact fit the ceiling?

use std::path::Path;
use tracing::debug;

/// What the controller should do with an encoded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Exists, non-empty and within the ceiling.
    Accept { byte_size: u64 },
    /// A valid file that is larger than the ceiling.
    Oversized { byte_size: u64 },
    /// Missing or empty; never usable.
    Invalid,
}

/// Inspects `path` against `ceiling_bytes` without touching it.
async fn inspect(path: &Path, ceiling_bytes: u64) -> Verdict {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            if meta.len() <= ceiling_bytes {
                Verdict::Accept {
                    byte_size: meta.len(),
                }
            } else {
                Verdict::Oversized {
                    byte_size: meta.len(),
                }
            }
        }
        _ => Verdict::Invalid,
    }
}

/// Validates `path` against `ceiling_bytes`, deleting it when it is invalid.
///
/// Oversized files are left in place: the caller keeps the newest one as a
/// fallback and [`discard`]s it once a later rung supersedes it.
pub async fn validate(path: &Path, ceiling_bytes: u64) -> Verdict {
    let verdict = inspect(path, ceiling_bytes).await;
    if verdict == Verdict::Invalid {
        discard(path).await;
    }
    verdict
}

/// Removes a rejected artifact, ignoring files that are already gone.
pub async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Discarded rejected artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "Failed to discard artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_accept_under_ceiling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, vec![0u8; 100]).await.unwrap();

        let verdict = validate(&path, 100).await;
        assert_eq!(verdict, Verdict::Accept { byte_size: 100 });
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_oversized_is_kept_for_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");
        tokio::fs::write(&path, vec![0u8; 101]).await.unwrap();

        let verdict = validate(&path, 100).await;
        assert_eq!(verdict, Verdict::Oversized { byte_size: 101 });
        assert!(path.exists());

        discard(&path).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_and_missing_are_invalid() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.mp4");
        tokio::fs::write(&empty, b"").await.unwrap();

        assert_eq!(validate(&empty, 100).await, Verdict::Invalid);
        assert!(!empty.exists());
        assert_eq!(
            validate(&dir.path().join("missing.mp4"), 100).await,
            Verdict::Invalid
        );
    }
}
