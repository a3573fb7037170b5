//! PostgreSQL company store

use async_trait::async_trait;
use bizsync_common::types::{Record, StoredCompany};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{CompanyStore, StoreError, StoreResult};

/// [`CompanyStore`] backed by the `companies` table
#[derive(Debug, Clone)]
pub struct PgCompanyStore {
    pool: PgPool,
}

impl PgCompanyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Database record structure for sqlx query
#[derive(Debug, sqlx::FromRow)]
struct CompanyRecord {
    id: Uuid,
    name: String,
    zip: String,
    website: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRecord> for StoredCompany {
    fn from(row: CompanyRecord) -> Self {
        StoredCompany {
            id: row.id,
            name: row.name,
            zip: row.zip,
            website: row.website,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Build a `LIKE` pattern matching every lowercase name starting with `name`
pub(crate) fn prefix_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 1);
    for c in name.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl CompanyStore for PgCompanyStore {
    #[tracing::instrument(skip(self))]
    async fn find(&self, name: &str, zip: Option<&str>) -> StoreResult<Vec<StoredCompany>> {
        let rows = sqlx::query_as::<_, CompanyRecord>(
            r#"
            SELECT id, name, zip, website, created_at, updated_at
            FROM companies
            WHERE LOWER(name) LIKE $1 ESCAPE '\'
              AND ($2::VARCHAR IS NULL OR zip = $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(prefix_pattern(name))
        .bind(zip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredCompany::from).collect())
    }

    #[tracing::instrument(skip(self, record), fields(name = %record.name))]
    async fn insert(&self, record: &Record) -> StoreResult<StoredCompany> {
        let row = sqlx::query_as::<_, CompanyRecord>(
            r#"
            INSERT INTO companies (id, name, zip, website)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, zip, website, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.name)
        .bind(record.zip.as_deref().unwrap_or_default())
        .bind(record.website.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self))]
    async fn update_website(&self, id: Uuid, website: Option<&str>) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE companies
            SET website = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(website)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }
}
