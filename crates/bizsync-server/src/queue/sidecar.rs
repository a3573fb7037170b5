//! Queue sidecars and enqueueing
//!
//! Each queued `<name>.csv` may have a `<name>.csv.json` sidecar recording how
//! it was submitted. Uploads land as `.part` files first and are renamed once
//! the sidecar is in place, so the worker never sees a half-written queue item.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bizsync_common::types::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::error::{QueueError, QueueResult};

pub const SIDECAR_EXTENSION: &str = "json";
pub const PART_EXTENSION: &str = "part";

/// Submission metadata stored next to a queued file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSidecar {
    pub strategy: Strategy,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

/// `<file>.<ext>` next to `file`
fn with_appended_extension(file: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = file.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

pub fn sidecar_path(file: &Path) -> PathBuf {
    with_appended_extension(file, SIDECAR_EXTENSION)
}

impl QueueSidecar {
    pub fn new(strategy: Strategy, original_name: Option<String>) -> Self {
        Self {
            strategy,
            submitted_at: Utc::now(),
            original_name,
        }
    }

    /// Read the sidecar of `file`; `Ok(None)` when there is none
    pub async fn read(file: &Path) -> QueueResult<Option<Self>> {
        let path = sidecar_path(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| QueueError::Sidecar { path, source })
    }

    pub async fn write(&self, file: &Path) -> QueueResult<()> {
        let path = sidecar_path(file);
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| QueueError::Sidecar {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Remove the sidecar of `file` if present
    pub async fn remove(file: &Path) -> QueueResult<()> {
        match tokio::fs::remove_file(sidecar_path(file)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Strategy for a queued file: sidecar, then filename marker, then merge
pub async fn resolve_strategy(file: &Path) -> Strategy {
    match QueueSidecar::read(file).await {
        Ok(Some(sidecar)) => return sidecar.strategy,
        Ok(None) => {},
        Err(e) => warn!(error = %e, "Ignoring unreadable sidecar"),
    }

    file.file_name()
        .and_then(|name| name.to_str())
        .and_then(Strategy::from_file_name)
        .unwrap_or_default()
}

/// A file accepted into the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedUpload {
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub strategy: Strategy,
    pub submitted_at: DateTime<Utc>,
}

/// Write `bytes` into the drop directory as `@<strategy>-<millis>.csv`.
///
/// The content is written to a `.part` file, the sidecar is written, then
/// the `.part` file is renamed into place.
pub async fn enqueue(
    uploaded_dir: &Path,
    bytes: &[u8],
    strategy: Strategy,
    original_name: Option<String>,
) -> QueueResult<QueuedUpload> {
    tokio::fs::create_dir_all(uploaded_dir).await?;

    let sidecar = QueueSidecar::new(strategy, original_name);
    let stem = format!(
        "{}{}",
        strategy.file_marker(),
        sidecar.submitted_at.timestamp_millis()
    );

    let (path, mut part_file, part_path) = reserve(uploaded_dir, &stem).await?;

    part_file.write_all(bytes).await?;
    part_file.sync_all().await?;
    drop(part_file);

    sidecar.write(&path).await?;
    tokio::fs::rename(&part_path, &path).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    info!(file = %file_name, strategy = %strategy, bytes = bytes.len(), "Upload queued");

    Ok(QueuedUpload {
        file_name,
        path,
        strategy,
        submitted_at: sidecar.submitted_at,
    })
}

/// Claim a name whose `.csv` does not exist by creating its `.part` file
async fn reserve(dir: &Path, stem: &str) -> QueueResult<(PathBuf, tokio::fs::File, PathBuf)> {
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{stem}.csv")
        } else {
            format!("{stem}-{n}.csv")
        };
        n += 1;

        let path = dir.join(name);
        if tokio::fs::try_exists(&path).await? {
            continue;
        }

        let part_path = with_appended_extension(&path, PART_EXTENSION);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part_path)
            .await
        {
            Ok(file) => return Ok((path, file, part_path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
