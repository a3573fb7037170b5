//! Moving processed uploads out of the drop directory

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use super::error::QueueResult;

/// First free `<stem><ext>` in `dir`, appending `-1`, `-2`, ... on collision
pub async fn unique_path(dir: &Path, stem: &str, ext: &str) -> QueueResult<PathBuf> {
    let mut candidate = dir.join(format!("{stem}{ext}"));
    let mut n = 1u32;
    while tokio::fs::try_exists(&candidate).await? {
        candidate = dir.join(format!("{stem}-{n}{ext}"));
        n += 1;
    }
    Ok(candidate)
}

/// Move `source` into `dest_dir` as `<completion-millis>.csv`.
///
/// Falls back to copy and remove when a rename is not possible (for example
/// across filesystems).
pub async fn archive_file(source: &Path, dest_dir: &Path) -> QueueResult<PathBuf> {
    tokio::fs::create_dir_all(dest_dir).await?;

    let stem = Utc::now().timestamp_millis().to_string();
    let dest = unique_path(dest_dir, &stem, ".csv").await?;

    match tokio::fs::rename(source, &dest).await {
        Ok(()) => {},
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(e.into()),
        Err(e) => {
            warn!(error = %e, "Rename failed, copying instead");
            tokio::fs::copy(source, &dest).await?;
            tokio::fs::remove_file(source).await?;
        },
    }

    debug!(from = %source.display(), to = %dest.display(), "Archived upload");
    Ok(dest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unique_path_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "100", ".csv").await.unwrap();
        assert_eq!(first, dir.path().join("100.csv"));

        tokio::fs::write(&first, "").await.unwrap();
        let second = unique_path(dir.path(), "100", ".csv").await.unwrap();
        assert_eq!(second, dir.path().join("100-1.csv"));

        tokio::fs::write(&second, "").await.unwrap();
        let third = unique_path(dir.path(), "100", ".csv").await.unwrap();
        assert_eq!(third, dir.path().join("100-2.csv"));
    }

    #[tokio::test]
    async fn test_archive_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("@import-1.csv");
        tokio::fs::write(&source, "Fakeblock,90776\n").await.unwrap();

        let dest = archive_file(&source, &dir.path().join("imported")).await.unwrap();

        assert!(!source.exists());
        assert_eq!(
            tokio::fs::read_to_string(&dest).await.unwrap(),
            "Fakeblock,90776\n"
        );
        assert_eq!(dest.extension().and_then(|e| e.to_str()), Some("csv"));
    }

    #[tokio::test]
    async fn test_archive_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = archive_file(&dir.path().join("gone.csv"), dir.path()).await;
        assert!(result.is_err());
    }
}
