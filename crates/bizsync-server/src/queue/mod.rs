//! Upload queue
//!
//! Uploads are dropped into `uploaded/` under the queue root and drained by a
//! single [`QueueWorker`], guarded by a [`RunLock`] marker file that is also
//! honoured by the import CLI.

pub mod archive;
pub mod config;
pub mod error;
pub mod lock;
pub mod sidecar;
pub mod worker;

pub use config::QueueConfig;
pub use error::{LockError, QueueError, QueueResult};
pub use lock::{RunLock, RunLockGuard};
pub use sidecar::{enqueue, QueueSidecar, QueuedUpload};
pub use worker::{QueueItem, QueueWorker, TickOutcome};
