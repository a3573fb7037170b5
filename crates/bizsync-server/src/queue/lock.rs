//! Run lock
//!
//! A marker file created atomically with `create_new`. The file is visible to
//! other processes, so the CLI and the server worker never import at the same
//! time. [`RunLockGuard`] removes the marker when released or dropped,
//! including during a panic unwind.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::LockError;

/// Contents of the marker file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub acquired_at: DateTime<Utc>,
    pub pid: u32,
    pub hostname: String,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            acquired_at: Utc::now(),
            pid: std::process::id(),
            hostname: hostname::get()
                .unwrap_or_else(|_| "unknown".into())
                .to_string_lossy()
                .to_string(),
        }
    }
}

/// Exclusive run lock backed by a marker file
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
    stale_after: Duration,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a marker file currently exists
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Current holder, when the marker is readable
    pub fn holder(&self) -> Option<LockHolder> {
        read_holder(&self.path)
    }

    /// Acquire the lock.
    ///
    /// A marker older than the stale threshold is reclaimed and acquisition is
    /// retried once.
    ///
    /// # Errors
    ///
    /// `Contended` when another holder owns a fresh marker.
    pub fn acquire(&self) -> Result<RunLockGuard, LockError> {
        match self.try_create() {
            Err(LockError::Contended { .. }) if self.is_stale() => {
                warn!(
                    path = %self.path.display(),
                    holder = ?self.holder(),
                    "Reclaiming stale run lock"
                );
                self.reclaim()?;
                self.try_create()
            },
            result => result,
        }
    }

    fn try_create(&self) -> Result<RunLockGuard, LockError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::Contended {
                    path: self.path.clone(),
                    held_since: self.holder().map(|h| h.acquired_at),
                });
            },
            Err(e) => return Err(e.into()),
        };

        // From here on the marker is ours and the guard cleans it up on error
        let guard = RunLockGuard {
            path: self.path.clone(),
            released: false,
        };

        let holder = LockHolder::current();
        let content = serde_json::to_vec(&holder).map_err(std::io::Error::from)?;
        file.write_all(&content)?;
        file.sync_all()?;

        debug!(path = %self.path.display(), pid = holder.pid, "Run lock acquired");
        Ok(guard)
    }

    /// Move a stale marker out of the way.
    ///
    /// The marker is first renamed to a tombstone only this call knows about,
    /// so two acquirers cannot both remove it. The tombstone is then aged
    /// again: if another acquirer replaced the stale marker in the meantime,
    /// the fresh marker is put back and the lock is reported as contended.
    fn reclaim(&self) -> Result<(), LockError> {
        let tombstone = self.tombstone_path();
        match fs::rename(&self.path, &tombstone) {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        if marker_age(&tombstone).is_some_and(|age| age >= self.stale_after) {
            fs::remove_file(&tombstone)?;
            return Ok(());
        }

        let held_since = read_holder(&tombstone).map(|h| h.acquired_at);
        warn!(path = %self.path.display(), "Run lock was taken over during reclaim, restoring it");

        // hard_link never overwrites an existing marker
        match fs::hard_link(&tombstone, &self.path) {
            Ok(()) => fs::remove_file(&tombstone)?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => fs::remove_file(&tombstone)?,
            Err(_) => fs::rename(&tombstone, &self.path)?,
        }

        Err(LockError::Contended {
            path: self.path.clone(),
            held_since,
        })
    }

    fn tombstone_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "run.lock".into());
        name.push(format!(
            ".stale-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        self.path.with_file_name(name)
    }

    fn is_stale(&self) -> bool {
        marker_age(&self.path).is_some_and(|age| age >= self.stale_after)
    }
}

fn read_holder(path: &Path) -> Option<LockHolder> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Age of a marker, from its recorded timestamp or, for unreadable markers,
/// its modification time
fn marker_age(path: &Path) -> Option<Duration> {
    if let Some(holder) = read_holder(path) {
        return (Utc::now() - holder.acquired_at).to_std().ok();
    }
    fs::metadata(path).ok()?.modified().ok()?.elapsed().ok()
}

/// Held run lock; removes the marker on release or drop
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct RunLockGuard {
    path: PathBuf,
    released: bool,
}

impl RunLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the marker, reporting failures
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "Run lock released");
        Ok(())
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove run lock");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn lock_in(dir: &Path) -> RunLock {
        RunLock::new(dir.join("import.lock"), Duration::from_secs(3600))
    }

    #[test]
    fn test_acquire_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        let guard = lock.acquire().unwrap();
        assert!(lock.is_held());
        assert!(matches!(lock.acquire(), Err(LockError::Contended { .. })));

        guard.release().unwrap();
        assert!(!lock.is_held());
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_marker_records_holder() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        let _guard = lock.acquire().unwrap();
        let holder = lock.holder().unwrap();
        assert_eq!(holder.pid, std::process::id());
        assert!(Utc::now() - holder.acquired_at < chrono::Duration::minutes(1));
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        {
            let _guard = lock.acquire().unwrap();
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn test_panic_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        let result = std::panic::catch_unwind(|| {
            let _guard = lock.acquire().unwrap();
            panic!("import blew up");
        });

        assert!(result.is_err());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        let stale = LockHolder {
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            pid: 1,
            hostname: "elsewhere".to_string(),
        };
        fs::write(lock.path(), serde_json::to_vec(&stale).unwrap()).unwrap();

        let guard = lock.acquire().unwrap();
        assert_eq!(lock.holder().unwrap().pid, std::process::id());

        // no tombstone is left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        drop(guard);
    }

    #[test]
    fn test_late_reclaim_does_not_steal_a_fresh_lock() {
        let dir = tempfile::tempdir().unwrap();
        let worker = lock_in(dir.path());
        let cli = lock_in(dir.path());

        let stale = LockHolder {
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            pid: 1,
            hostname: "elsewhere".to_string(),
        };
        fs::write(worker.path(), serde_json::to_vec(&stale).unwrap()).unwrap();

        // the CLI sees the stale marker first...
        assert!(matches!(cli.try_create(), Err(LockError::Contended { .. })));
        assert!(cli.is_stale());

        // ...but the worker reclaims it before the CLI acts
        let guard = worker.acquire().unwrap();
        let holder = worker.holder().unwrap();

        // the CLI's reclaim must leave the worker's marker in place
        assert!(matches!(cli.reclaim(), Err(LockError::Contended { .. })));
        assert!(matches!(cli.try_create(), Err(LockError::Contended { .. })));
        assert_eq!(worker.holder(), Some(holder));

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        guard.release().unwrap();
        assert!(!worker.is_held());
    }

    #[test]
    fn test_reclaim_of_vanished_marker_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        lock.reclaim().unwrap();
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_fresh_foreign_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(dir.path());

        // legacy empty marker: age falls back to the file's mtime
        fs::write(lock.path(), b"").unwrap();

        assert!(matches!(lock.acquire(), Err(LockError::Contended { .. })));
        assert!(lock.is_held());
    }
}
