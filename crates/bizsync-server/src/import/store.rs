//! Company store capability
//!
//! The reconciliation engine only needs three operations from persistence:
//! candidate lookup, insert, and a website update. [`CompanyStore`] captures
//! exactly that so the engine can run against PostgreSQL in production and
//! against [`MemoryCompanyStore`] in tests and dry runs.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bizsync_common::types::{Record, StoredCompany};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Company '{0}' not found")]
    NotFound(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal persistence capability used by reconciliation
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Companies whose name starts with `name` (case-insensitive) and, when
    /// `zip` is given, whose zip equals it exactly.
    async fn find(&self, name: &str, zip: Option<&str>) -> StoreResult<Vec<StoredCompany>>;

    /// Persist a new company built from a record
    async fn insert(&self, record: &Record) -> StoreResult<StoredCompany>;

    /// Replace the website of an existing company
    async fn update_website(&self, id: Uuid, website: Option<&str>) -> StoreResult<()>;

    /// Cheap reachability probe
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Case-insensitive name prefix test shared by every store implementation
pub fn name_matches(stored: &str, query: &str) -> bool {
    stored.to_lowercase().starts_with(&query.to_lowercase())
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryCompanyStore {
    companies: RwLock<Vec<StoredCompany>>,
    offline: AtomicBool,
}

impl MemoryCompanyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing companies
    pub fn with_companies(companies: Vec<StoredCompany>) -> Self {
        Self {
            companies: RwLock::new(companies),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` until reset
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<StoredCompany> {
        self.companies.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.companies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.companies.read().await.is_empty()
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

/// Build a stored company without touching a store
pub fn stored_company(name: &str, zip: &str, website: Option<&str>) -> StoredCompany {
    let now = Utc::now();
    StoredCompany {
        id: Uuid::new_v4(),
        name: name.to_string(),
        zip: zip.to_string(),
        website: website.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl CompanyStore for MemoryCompanyStore {
    async fn find(&self, name: &str, zip: Option<&str>) -> StoreResult<Vec<StoredCompany>> {
        self.ensure_online()?;
        let companies = self.companies.read().await;
        Ok(companies
            .iter()
            .filter(|c| name_matches(&c.name, name))
            .filter(|c| zip.is_none_or(|z| c.zip == z))
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &Record) -> StoreResult<StoredCompany> {
        self.ensure_online()?;
        let company = stored_company(
            &record.name,
            record.zip.as_deref().unwrap_or_default(),
            record.website.as_deref(),
        );
        self.companies.write().await.push(company.clone());
        Ok(company)
    }

    async fn update_website(&self, id: Uuid, website: Option<&str>) -> StoreResult<()> {
        self.ensure_online()?;
        let mut companies = self.companies.write().await;
        let company = companies
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound(id))?;
        company.website = website.map(str::to_string);
        company.updated_at = Utc::now();
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.ensure_online()
    }
}
