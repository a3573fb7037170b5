//! Queue errors

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Run lock failures
#[derive(Error, Debug)]
pub enum LockError {
    /// Another run holds the lock
    #[error("Run lock {} is already held", .path.display())]
    Contended {
        path: PathBuf,
        held_since: Option<DateTime<Utc>>,
    },

    #[error("Run lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Queue worker and enqueue failures
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("Invalid sidecar {}: {source}", .path.display())]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type QueueResult<T> = Result<T, QueueError>;
