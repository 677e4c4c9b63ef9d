//! Single-file move and copy.
//!
//! A move is a rename when source and destination share a filesystem, and a
//! copy followed by removing the source when they do not.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// How a file reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Rename into place; the source path is gone afterwards
    Move,
    /// Copy into place; the source is left untouched
    Copy,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Move => "move",
            TransferMode::Copy => "copy",
        }
    }
}

/// Moves or copies `src` to `dest`, replacing whatever `dest` holds.
pub async fn transfer_file(src: &Path, dest: &Path, mode: TransferMode) -> std::io::Result<()> {
    match mode {
        TransferMode::Copy => {
            fs::copy(src, dest).await?;
            Ok(())
        }
        TransferMode::Move => match fs::rename(src, dest).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                tracing::debug!(
                    "Cross-device move of {}, falling back to copy",
                    src.display()
                );
                copy_then_remove(src, dest).await
            }
            Err(e) => Err(e),
        },
    }
}

/// Moves by copying then deleting the source. The source is only removed
/// once the copy has fully succeeded.
pub async fn copy_then_remove(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::copy(src, dest).await?;
    fs::remove_file(src).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_removes_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jpg");
        let dest = temp.path().join("b.jpg");
        std::fs::write(&src, b"pixels").unwrap();

        transfer_file(&src, &dest, TransferMode::Move).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jpg");
        let dest = temp.path().join("b.jpg");
        std::fs::write(&src, b"pixels").unwrap();

        transfer_file(&src, &dest, TransferMode::Copy).await.unwrap();

        assert!(src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_move_replaces_placeholder() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jpg");
        let dest = temp.path().join("b.jpg");
        std::fs::write(&src, b"pixels").unwrap();
        std::fs::write(&dest, b"").unwrap();

        transfer_file(&src, &dest, TransferMode::Move).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_copy_then_remove() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jpg");
        let dest = temp.path().join("b.jpg");
        std::fs::write(&src, b"pixels").unwrap();
        std::fs::write(&dest, b"").unwrap();

        copy_then_remove(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_copy_then_remove_keeps_source_when_copy_fails() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.jpg");
        std::fs::write(&src, b"pixels").unwrap();

        let result = copy_then_remove(&src, &temp.path().join("missing/dir/b.jpg")).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&src).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = transfer_file(
            &temp.path().join("gone.jpg"),
            &temp.path().join("dest.jpg"),
            TransferMode::Move,
        )
        .await;
        assert!(result.is_err());
    }
}
