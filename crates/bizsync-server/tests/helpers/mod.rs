//! Shared helpers for bizsync server integration tests
//!
//! - Queue layouts rooted in temporary directories
//! - Stores that misbehave on purpose (panic, block)

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bizsync_common::types::{Record, StoredCompany};
use bizsync_server::import::{CompanyStore, Importer, MemoryCompanyStore, StoreResult};
use bizsync_server::queue::{QueueConfig, QueueWorker};
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

/// A queue worker over a fresh temporary root
pub struct TestQueue {
    pub dir: TempDir,
    pub config: QueueConfig,
    pub worker: QueueWorker,
}

impl TestQueue {
    pub async fn new(store: Arc<dyn CompanyStore>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig {
            poll_interval_secs: 1,
            ..QueueConfig::with_root(dir.path())
        };
        let worker = QueueWorker::new(config.clone(), Importer::new(store));
        worker.ensure_layout().await.unwrap();
        Self {
            dir,
            config,
            worker,
        }
    }

    /// Drop a raw file into `uploaded/` without a sidecar
    pub async fn drop_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.config.uploaded_dir().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    pub async fn uploaded(&self) -> Vec<String> {
        list(&self.config.uploaded_dir()).await
    }

    pub async fn imported(&self) -> Vec<String> {
        list(&self.config.imported_dir()).await
    }

    pub async fn failed(&self) -> Vec<String> {
        list(&self.config.failed_dir()).await
    }
}

/// Sorted file names in a directory
pub async fn list(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return names;
    };
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    names
}

pub fn memory_store() -> Arc<MemoryCompanyStore> {
    Arc::new(MemoryCompanyStore::new())
}

/// Panics on every call
pub struct PanickingStore;

#[async_trait]
impl CompanyStore for PanickingStore {
    async fn find(&self, _name: &str, _zip: Option<&str>) -> StoreResult<Vec<StoredCompany>> {
        panic!("store exploded");
    }

    async fn insert(&self, _record: &Record) -> StoreResult<StoredCompany> {
        panic!("store exploded");
    }

    async fn update_website(&self, _id: Uuid, _website: Option<&str>) -> StoreResult<()> {
        panic!("store exploded");
    }
}

/// Wraps a memory store and parks the first lookup until released
pub struct BlockingStore {
    inner: MemoryCompanyStore,
    pub entered: Notify,
    pub release: Notify,
    pub finds: AtomicUsize,
}

impl BlockingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCompanyStore::new(),
            entered: Notify::new(),
            release: Notify::new(),
            finds: AtomicUsize::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl CompanyStore for BlockingStore {
    async fn find(&self, name: &str, zip: Option<&str>) -> StoreResult<Vec<StoredCompany>> {
        if self.finds.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.find(name, zip).await
    }

    async fn insert(&self, record: &Record) -> StoreResult<StoredCompany> {
        self.inner.insert(record).await
    }

    async fn update_website(&self, id: Uuid, website: Option<&str>) -> StoreResult<()> {
        self.inner.update_website(id, website).await
    }
}
