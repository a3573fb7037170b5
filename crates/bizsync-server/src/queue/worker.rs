//! Queue worker
//!
//! Each tick picks the oldest `.csv` in the drop directory, takes the run
//! lock, imports the file in its own task and archives it to `imported/` or
//! `failed/`. A contended lock leaves every file where it is.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bizsync_common::types::Strategy;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::import::{ImportStats, Importer};

use super::archive::archive_file;
use super::config::QueueConfig;
use super::error::{LockError, QueueResult};
use super::lock::RunLock;
use super::sidecar::{resolve_strategy, QueueSidecar};

/// A pending upload selected for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub path: PathBuf,
    /// Creation time, or modification time where creation is not reported
    pub queued_at: SystemTime,
    pub strategy: Strategy,
}

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing pending
    Idle,
    /// Another run holds the lock; no file was touched
    AlreadyRunning,
    Succeeded {
        file: PathBuf,
        archived: PathBuf,
        stats: ImportStats,
    },
    Failed {
        file: PathBuf,
        archived: PathBuf,
        reason: String,
    },
}

/// Drains the upload directory one file at a time
#[derive(Clone)]
pub struct QueueWorker {
    config: QueueConfig,
    importer: Importer,
    lock: RunLock,
}

impl QueueWorker {
    pub fn new(config: QueueConfig, importer: Importer) -> Self {
        let lock = RunLock::new(config.lock_path(), config.stale_lock_after());
        Self {
            config,
            importer,
            lock,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// Create the queue directories
    pub async fn ensure_layout(&self) -> QueueResult<()> {
        for dir in [
            self.config.uploaded_dir(),
            self.config.imported_dir(),
            self.config.failed_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Pending `.csv` files, oldest first.
    ///
    /// Files with the same timestamp are ordered by path.
    pub async fn pending(&self) -> QueueResult<Vec<(PathBuf, SystemTime)>> {
        let dir = self.config.uploaded_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_queued_csv(&path) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let queued_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, queued_at));
        }

        sort_oldest_first(&mut files);
        Ok(files)
    }

    /// The oldest pending file with its strategy resolved
    pub async fn next_item(&self) -> QueueResult<Option<QueueItem>> {
        let Some((path, queued_at)) = self.pending().await?.into_iter().next() else {
            return Ok(None);
        };
        let strategy = resolve_strategy(&path).await;
        Ok(Some(QueueItem {
            path,
            queued_at,
            strategy,
        }))
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Only for queue-level I/O failures (listing, archiving, lock I/O). Import
    /// failures are routed to `failed/` and reported as [`TickOutcome::Failed`].
    pub async fn tick(&self) -> QueueResult<TickOutcome> {
        let Some(item) = self.next_item().await? else {
            return Ok(TickOutcome::Idle);
        };

        let guard = match self.lock.acquire() {
            Ok(guard) => guard,
            Err(LockError::Contended { .. }) => {
                debug!(file = %item.path.display(), "Import already running");
                return Ok(TickOutcome::AlreadyRunning);
            },
            Err(e) => return Err(e.into()),
        };

        let outcome = self.process(item).await;
        // the file is already archived; a failed release must not hide that
        if let Err(e) = guard.release() {
            warn!(path = %self.lock.path().display(), error = %e, "Failed to release run lock");
        }
        outcome
    }

    #[tracing::instrument(skip(self, item), fields(file = %item.path.display(), strategy = %item.strategy))]
    async fn process(&self, item: QueueItem) -> QueueResult<TickOutcome> {
        let importer = self.importer.clone();
        let path = item.path.clone();
        let strategy = item.strategy;
        let joined =
            tokio::spawn(async move { importer.process_file(&path, strategy).await }).await;

        let result = match joined {
            Ok(Ok(stats)) => Ok(stats),
            Ok(Err(e)) => Err(format!("{} ({})", e, e.kind())),
            Err(e) if e.is_panic() => Err("import task panicked".to_string()),
            Err(e) => Err(e.to_string()),
        };

        let outcome = match result {
            Ok(stats) => {
                let archived = archive_file(&item.path, &self.config.imported_dir()).await?;
                info!(
                    archived = %archived.display(),
                    created = stats.created,
                    updated = stats.updated,
                    "Upload imported"
                );
                TickOutcome::Succeeded {
                    file: item.path.clone(),
                    archived,
                    stats,
                }
            },
            Err(reason) => {
                let archived = archive_file(&item.path, &self.config.failed_dir()).await?;
                error!(archived = %archived.display(), %reason, "Upload failed");
                TickOutcome::Failed {
                    file: item.path.clone(),
                    archived,
                    reason,
                }
            },
        };

        if let Err(e) = QueueSidecar::remove(&item.path).await {
            warn!(error = %e, "Failed to remove sidecar");
        }

        Ok(outcome)
    }

    /// Tick every `poll_interval_secs` until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        if let Err(e) = self.ensure_layout().await {
            error!(error = %e, root = %self.config.root.display(), "Failed to create queue directories");
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            root = %self.config.root.display(),
            interval_secs = self.config.poll_interval_secs,
            "Queue worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping queue worker");
                    break;
                }

                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(TickOutcome::Idle) => debug!("No pending uploads"),
                Ok(TickOutcome::AlreadyRunning) => info!("Previous import still running"),
                Ok(_) => {},
                Err(e) => error!(error = %e, "Queue tick failed"),
            }
        }

        info!("Queue worker stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

fn sort_oldest_first(files: &mut [(PathBuf, SystemTime)]) {
    files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
}

fn is_queued_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_csv_files_are_queued() {
        assert!(is_queued_csv(Path::new("uploaded/@merge-1.csv")));
        assert!(is_queued_csv(Path::new("uploaded/LEGACY.CSV")));
        assert!(!is_queued_csv(Path::new("uploaded/@merge-1.csv.part")));
        assert!(!is_queued_csv(Path::new("uploaded/@merge-1.csv.json")));
        assert!(!is_queued_csv(Path::new("uploaded/notes.txt")));
    }

    #[test]
    fn test_equal_timestamps_fall_back_to_path_order() {
        let t0 = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(100);
        let t1 = t0 + std::time::Duration::from_secs(1);
        let mut files = vec![
            (PathBuf::from("uploaded/b.csv"), t0),
            (PathBuf::from("uploaded/c.csv"), t1),
            (PathBuf::from("uploaded/a.csv"), t0),
        ];

        sort_oldest_first(&mut files);

        let names: Vec<_> = files.iter().map(|(p, _)| p.to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["uploaded/a.csv", "uploaded/b.csv", "uploaded/c.csv"]);
    }
}
