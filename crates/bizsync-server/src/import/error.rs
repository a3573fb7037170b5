//! Import and reconciliation errors

use thiserror::Error;

use super::store::StoreError;

/// Result type alias for import operations
pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Errors raised while reading, normalizing or reconciling company records
#[derive(Error, Debug)]
pub enum ImportError {
    /// No rows, or no row satisfies the required columns. Fatal for a file.
    #[error("Empty or invalid input: {0}")]
    EmptyInput(String),

    /// A record does not have the required shape
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Merge requested but no stored company matches
    #[error("Nothing to merge for '{name}' ({zip})")]
    NothingToMerge { name: String, zip: String },

    /// More than one stored company matches
    #[error("{count} companies match '{name}' ({zip})")]
    AmbiguousMatch {
        name: String,
        zip: String,
        count: usize,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid column pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ImportError {
    pub(crate) fn nothing_to_merge(name: &str, zip: Option<&str>) -> Self {
        Self::NothingToMerge {
            name: name.to_string(),
            zip: zip.unwrap_or("-").to_string(),
        }
    }

    pub(crate) fn ambiguous(name: &str, zip: Option<&str>, count: usize) -> Self {
        Self::AmbiguousMatch {
            name: name.to_string(),
            zip: zip.unwrap_or("-").to_string(),
            count,
        }
    }

    /// Machine-readable error code surfaced to API callers
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::EmptyInput(_) => "EMPTY_INPUT",
            ImportError::Validation(_) => "VALIDATION_ERROR",
            ImportError::NothingToMerge { .. } => "NOTHING_TO_MERGE",
            ImportError::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            ImportError::Store(_) => "STORE_ERROR",
            ImportError::Read(_) => "READ_ERROR",
            ImportError::Csv(_) => "CSV_ERROR",
            ImportError::Pattern(_) => "INVALID_PATTERN",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ImportError::EmptyInput("x".into()).kind(), "EMPTY_INPUT");
        assert_eq!(ImportError::nothing_to_merge("Foo", None).kind(), "NOTHING_TO_MERGE");
        assert_eq!(
            ImportError::Store(StoreError::Unavailable("down".into())).kind(),
            "STORE_ERROR"
        );
    }

    #[test]
    fn test_ambiguous_message() {
        let err = ImportError::ambiguous("Bayer", Some("32736"), 2);
        assert_eq!(err.to_string(), "2 companies match 'Bayer' (32736)");
    }
}
