//! Company record import
//!
//! Turns headerless tabular files into validated [`Record`]s and reconciles
//! them against a [`CompanyStore`].
//!
//! [`Record`]: bizsync_common::types::Record

pub mod columns;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pg_store;
pub mod pipeline;
pub mod reader;
pub mod store;

pub use columns::{ColumnDescriptor, ColumnSpec};
pub use engine::{ImportStats, Mode, Reconciler};
pub use error::{ImportError, ImportResult};
pub use normalize::{infer_columns, normalize, ColumnMapping};
pub use pg_store::PgCompanyStore;
pub use pipeline::Importer;
pub use store::{CompanyStore, MemoryCompanyStore, StoreError, StoreResult};
