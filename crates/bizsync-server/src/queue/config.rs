//! Queue configuration
//!
//! Where uploads are dropped and how often the worker looks at them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUEUE_ROOT: &str = "./data/queue";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_STALE_LOCK_SECS: u64 = 3600;

/// Directory names under the queue root
pub const UPLOADED_DIR: &str = "uploaded";
pub const IMPORTED_DIR: &str = "imported";
pub const FAILED_DIR: &str = "failed";
pub const LOCK_FILE: &str = "import.lock";

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_QUEUE_ROOT)
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_stale_lock() -> u64 {
    DEFAULT_STALE_LOCK_SECS
}

fn default_true() -> bool {
    true
}

/// File queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    /// Directory holding `uploaded/`, `imported/`, `failed/` and the run lock
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Seconds between worker ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Age after which a run lock is considered abandoned
    #[serde(default = "default_stale_lock")]
    pub stale_lock_secs: u64,
    /// Whether the server runs the worker
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            stale_lock_secs: DEFAULT_STALE_LOCK_SECS,
            enabled: true,
        }
    }
}

impl QueueConfig {
    /// Queue rooted at `root` with default timings
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load queue configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            root: std::env::var("QUEUE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_root()),
            poll_interval_secs: std::env::var("QUEUE_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            stale_lock_secs: std::env::var("QUEUE_STALE_LOCK_SECS")
                .unwrap_or_else(|_| DEFAULT_STALE_LOCK_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_STALE_LOCK_SECS),
            enabled: std::env::var("QUEUE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("QUEUE_POLL_INTERVAL_SECS must be greater than 0");
        }
        if self.stale_lock_secs == 0 {
            anyhow::bail!("QUEUE_STALE_LOCK_SECS must be greater than 0");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    pub fn uploaded_dir(&self) -> PathBuf {
        self.root.join(UPLOADED_DIR)
    }

    pub fn imported_dir(&self) -> PathBuf {
        self.root.join(IMPORTED_DIR)
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.root.join(FAILED_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layout_under_root() {
        let config = QueueConfig::with_root("/srv/queue");
        assert_eq!(config.uploaded_dir(), PathBuf::from("/srv/queue/uploaded"));
        assert_eq!(config.imported_dir(), PathBuf::from("/srv/queue/imported"));
        assert_eq!(config.failed_dir(), PathBuf::from("/srv/queue/failed"));
        assert_eq!(config.lock_path(), PathBuf::from("/srv/queue/import.lock"));
    }

    #[test]
    fn test_zero_interval_is_invalid() {
        let config = QueueConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("QUEUE_ROOT", "/tmp/bizsync-queue");
        std::env::set_var("QUEUE_POLL_INTERVAL_SECS", "5");
        std::env::set_var("QUEUE_ENABLED", "false");

        let config = QueueConfig::from_env().unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/bizsync-queue"));
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.stale_lock_secs, DEFAULT_STALE_LOCK_SECS);
        assert!(!config.enabled);

        std::env::remove_var("QUEUE_ROOT");
        std::env::remove_var("QUEUE_POLL_INTERVAL_SECS");
        std::env::remove_var("QUEUE_ENABLED");
    }
}
