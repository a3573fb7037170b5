//! File import pipeline: reader, normalizer, then lenient reconciliation

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bizsync_common::types::Strategy;
use tracing::info;

use super::columns::ColumnSpec;
use super::engine::{ImportStats, Reconciler};
use super::error::{ImportError, ImportResult};
use super::normalize::normalize;
use super::reader::read_rows;
use super::store::{CompanyStore, StoreError};

/// Imports whole files into a company store
#[derive(Clone)]
pub struct Importer {
    reconciler: Reconciler,
}

impl Importer {
    pub fn new(store: Arc<dyn CompanyStore>) -> Self {
        Self {
            reconciler: Reconciler::new(store),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Import one file.
    ///
    /// # Errors
    ///
    /// Read and parse failures, `EmptyInput` when no row qualifies, and
    /// `Store(Unavailable)` when every attempted record failed on the store.
    /// Per-record outcomes (skipped, ambiguous) are counted, not raised.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path, strategy: Strategy) -> ImportResult<ImportStats> {
        let start = Instant::now();

        let rows = read_rows(path).await?;
        let spec = ColumnSpec::companies(strategy)?;
        let records = normalize(&rows, &spec)?;

        let mut stats = self.reconciler.reconcile_batch(&records, strategy).await;
        stats.rows_read = rows.len();
        stats.rows_dropped = rows.len() - records.len();
        stats.elapsed_ms = start.elapsed().as_millis() as u64;

        if stats.store_unavailable() {
            return Err(ImportError::Store(StoreError::Unavailable(format!(
                "all {} records failed",
                stats.failed
            ))));
        }

        info!(
            strategy = %strategy,
            rows = stats.rows_read,
            valid = stats.records_valid,
            dropped = stats.rows_dropped,
            elapsed_ms = stats.elapsed_ms,
            "File imported"
        );

        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::import::store::{stored_company, MemoryCompanyStore};

    async fn write_csv(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("upload.csv");
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "Fakeblock,90776,https://fakeblock.com\nOther Co,,bad\nBluth Company,92660\n",
        )
        .await;

        let store = Arc::new(MemoryCompanyStore::new());
        let importer = Importer::new(store.clone());
        let stats = importer.process_file(&path, Strategy::Import).await.unwrap();

        assert_eq!(stats.rows_read, 3);
        assert_eq!(stats.records_valid, 2);
        assert_eq!(stats.rows_dropped, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_merge_file_only_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "Bayer;32736;bayer.de\nFakeblock;90776;fakeblock.com\n").await;

        let store = Arc::new(MemoryCompanyStore::with_companies(vec![stored_company(
            "Bayer AG", "32736", None,
        )]));
        let importer = Importer::new(store.clone());
        let stats = importer.process_file(&path, Strategy::Merge).await.unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "").await;

        let importer = Importer::new(Arc::new(MemoryCompanyStore::new()));
        let result = importer.process_file(&path, Strategy::Import).await;
        assert!(matches!(result, Err(ImportError::EmptyInput(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let importer = Importer::new(Arc::new(MemoryCompanyStore::new()));

        let result = importer
            .process_file(&dir.path().join("missing.csv"), Strategy::Import)
            .await;
        assert!(matches!(result, Err(ImportError::Read(_))));
    }

    #[tokio::test]
    async fn test_offline_store_fails_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "Fakeblock,90776\n").await;

        let store = Arc::new(MemoryCompanyStore::new());
        store.set_offline(true);
        let importer = Importer::new(store);

        let result = importer.process_file(&path, Strategy::Import).await;
        assert!(matches!(
            result,
            Err(ImportError::Store(StoreError::Unavailable(_)))
        ));
    }
}
