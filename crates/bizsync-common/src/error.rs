//! Error types for Bizsync

use thiserror::Error;

/// Result type alias for Bizsync operations
pub type Result<T> = std::result::Result<T, BizsyncError>;

/// Main error type for Bizsync
#[derive(Error, Debug)]
pub enum BizsyncError {
    #[error("Invalid strategy: {0} (expected 'merge' or 'import')")]
    InvalidStrategy(String),
}
