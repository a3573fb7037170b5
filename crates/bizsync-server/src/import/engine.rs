//! Reconciliation engine
//!
//! Resolves one normalized record at a time against the [`CompanyStore`]:
//! candidates are looked up by case-insensitive name prefix and exact zip, and
//! the strategy decides whether an unmatched record may be created.
//!
//! | strategy | candidates | lenient                  | strict           |
//! |----------|------------|--------------------------|------------------|
//! | merge    | 0          | `Skipped`                | `NothingToMerge` |
//! | either   | 1          | `Updated` or `Skipped`   | same             |
//! | import   | 0          | `Created`                | same             |
//! | either   | >1         | `Ambiguous`, no write    | `AmbiguousMatch` |

use std::sync::Arc;
use std::time::Instant;

use bizsync_common::types::{Outcome, Record, StoredCompany, Strategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::columns::ColumnSpec;
use super::error::{ImportError, ImportResult};
use super::store::CompanyStore;

/// How non-fatal reconciliation results are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Batch mode: nothing-to-merge and ambiguity become outcomes
    Lenient,
    /// Single-record mode: nothing-to-merge and ambiguity are errors
    Strict,
}

/// Counters for one reconciled file or batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    /// Rows read from the source
    pub rows_read: usize,
    /// Records that survived normalization
    pub records_valid: usize,
    /// Rows dropped by normalization
    pub rows_dropped: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub ambiguous: usize,
    /// Records whose reconciliation failed with a store error
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl ImportStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Ambiguous => self.ambiguous += 1,
        }
    }

    /// Records that reached the store
    pub fn attempted(&self) -> usize {
        self.created + self.updated + self.skipped + self.ambiguous + self.failed
    }

    /// At least one record was attempted and every attempt hit a store error
    pub fn store_unavailable(&self) -> bool {
        self.failed > 0 && self.failed == self.attempted()
    }
}

/// Applies the reconciliation decision table against a store
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn CompanyStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CompanyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CompanyStore> {
        &self.store
    }

    /// Stored companies whose name starts with `name` (case-insensitive) and,
    /// when given, whose zip equals `zip`
    pub async fn find_candidates(
        &self,
        name: &str,
        zip: Option<&str>,
    ) -> ImportResult<Vec<StoredCompany>> {
        Ok(self.store.find(name, zip).await?)
    }

    /// Reconcile one record.
    ///
    /// # Errors
    ///
    /// `Store` on persistence failure. In [`Mode::Strict`] also
    /// `NothingToMerge` and `AmbiguousMatch`.
    #[tracing::instrument(skip(self, record), fields(name = %record.name, zip = ?record.zip))]
    pub async fn reconcile(
        &self,
        record: &Record,
        strategy: Strategy,
        mode: Mode,
    ) -> ImportResult<Outcome> {
        let candidates = self
            .find_candidates(&record.name, record.zip.as_deref())
            .await?;

        match candidates.as_slice() {
            [] if strategy.may_create() => {
                let created = self.store.insert(record).await?;
                debug!(id = %created.id, "Created company");
                Ok(Outcome::Created)
            },
            [] => match mode {
                Mode::Lenient => Ok(Outcome::Skipped),
                Mode::Strict => Err(ImportError::nothing_to_merge(
                    &record.name,
                    record.zip.as_deref(),
                )),
            },
            [existing] => self.apply_website(existing, record).await,
            many => match mode {
                Mode::Lenient => {
                    warn!(candidates = many.len(), "Ambiguous match, record left untouched");
                    Ok(Outcome::Ambiguous)
                },
                Mode::Strict => Err(ImportError::ambiguous(
                    &record.name,
                    record.zip.as_deref(),
                    many.len(),
                )),
            },
        }
    }

    async fn apply_website(&self, existing: &StoredCompany, record: &Record) -> ImportResult<Outcome> {
        match record.website.as_deref() {
            Some(website) if existing.website.as_deref() != Some(website) => {
                self.store
                    .update_website(existing.id, Some(website))
                    .await?;
                debug!(id = %existing.id, website, "Updated company website");
                Ok(Outcome::Updated)
            },
            _ => Ok(Outcome::Skipped),
        }
    }

    /// Validate and reconcile a single submitted record in strict mode
    pub async fn reconcile_one(&self, record: &Record, strategy: Strategy) -> ImportResult<Outcome> {
        ColumnSpec::companies(strategy)?.validate_record(record)?;
        self.reconcile(record, strategy, Mode::Strict).await
    }

    /// Reconcile records in input order, one fully resolved before the next.
    ///
    /// Store failures are counted and processing continues.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub async fn reconcile_batch(&self, records: &[Record], strategy: Strategy) -> ImportStats {
        let start = Instant::now();
        let mut stats = ImportStats {
            records_valid: records.len(),
            ..Default::default()
        };

        for record in records {
            match self.reconcile(record, strategy, Mode::Lenient).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    warn!(name = %record.name, error = %e, "Failed to reconcile record");
                    stats.failed += 1;
                },
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            ambiguous = stats.ambiguous,
            failed = stats.failed,
            "Batch reconciled"
        );

        stats
    }
}
