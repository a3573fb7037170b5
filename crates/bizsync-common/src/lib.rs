//! Bizsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the Bizsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Workspace-wide error type and result alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Types**: Company records, reconciliation strategies and outcomes
//!
//! # Example
//!
//! ```no_run
//! use bizsync_common::types::{Record, Strategy};
//!
//! let record = Record::new("Fakeblock", Some("90776"), Some("https://fakeblock.com"));
//! let strategy: Strategy = "import".parse().unwrap();
//! assert!(strategy.may_create());
//! # let _ = record;
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{BizsyncError, Result};
pub use types::{Outcome, Record, StoredCompany, Strategy};
