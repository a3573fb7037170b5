//! bizsync server library
//!
//! Reconciles company name/zip/website files against a PostgreSQL store.
//!
//! # Overview
//!
//! - **Import** ([`import`]): headerless CSV reading, column inference,
//!   validation and the reconciliation engine with its `import` and `merge`
//!   strategies
//! - **Queue** ([`queue`]): the upload drop directory, its run lock and the
//!   worker that drains it one file at a time
//! - **API** ([`api`], [`features`]): upload, single-record reconcile,
//!   candidate lookup and health endpoints
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bizsync_common::types::Strategy;
//! use bizsync_server::import::{Importer, MemoryCompanyStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let importer = Importer::new(Arc::new(MemoryCompanyStore::new()));
//! let stats = importer
//!     .process_file(std::path::Path::new("companies.csv"), Strategy::Import)
//!     .await?;
//! println!("{} created", stats.created);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod import;
pub mod middleware;
pub mod queue;

pub use error::{ApiResult, AppError};
