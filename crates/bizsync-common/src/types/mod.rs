//! Common types used across Bizsync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BizsyncError;

// ============================================================================
// Strategy
// ============================================================================

/// How a batch of records is reconciled against the store.
///
/// `Import` may create companies that have no match; `Merge` only ever updates
/// companies that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Update existing companies only
    #[default]
    Merge,
    /// Create unmatched companies, update single matches
    Import,
}

impl Strategy {
    /// Whether a record without candidates becomes a new stored company
    pub fn may_create(self) -> bool {
        matches!(self, Strategy::Import)
    }

    /// Filename marker used for queued uploads (`@merge-` / `@import-`)
    pub fn file_marker(self) -> &'static str {
        match self {
            Strategy::Merge => "@merge-",
            Strategy::Import => "@import-",
        }
    }

    /// Recover a strategy from a legacy queued filename.
    ///
    /// Returns `None` when the name carries no marker.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.contains(Strategy::Import.file_marker()) {
            Some(Strategy::Import)
        } else if name.contains(Strategy::Merge.file_marker()) {
            Some(Strategy::Merge)
        } else {
            None
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = BizsyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(Strategy::Merge),
            "import" => Ok(Strategy::Import),
            other => Err(BizsyncError::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Merge => write!(f, "merge"),
            Strategy::Import => write!(f, "import"),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One normalized company row taken from tabular input.
///
/// Records are transient: built per row and handed straight to the
/// reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Company name as written in the source
    pub name: String,

    /// Five digit zip code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    /// Website, when the source carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Record {
    pub fn new(name: impl Into<String>, zip: Option<&str>, website: Option<&str>) -> Self {
        Self {
            name: name.into(),
            zip: zip.map(str::to_string),
            website: website.map(str::to_string),
        }
    }
}

/// A company persisted in the store.
///
/// # Examples
///
/// ```rust,ignore
/// use bizsync_common::types::StoredCompany;
///
/// let company = StoredCompany {
///     id: uuid::Uuid::new_v4(),
///     name: "Bayer AG".to_string(),
///     zip: "32736".to_string(),
///     website: None,
///     created_at: chrono::Utc::now(),
///     updated_at: chrono::Utc::now(),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredCompany {
    /// Unique identifier for the company
    pub id: Uuid,

    /// Registered company name
    pub name: String,

    /// Five digit zip code
    pub zip: String,

    /// Company website
    pub website: Option<String>,

    /// Timestamp when the company was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the company was last updated
    pub updated_at: DateTime<Utc>,
}

/// Result of reconciling one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A new company was inserted
    Created,
    /// The single matching company had its website changed
    Updated,
    /// Nothing to do
    Skipped,
    /// More than one candidate matched; nothing was written
    Ambiguous,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Created => write!(f, "created"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("merge".parse::<Strategy>().unwrap(), Strategy::Merge);
        assert_eq!("IMPORT".parse::<Strategy>().unwrap(), Strategy::Import);
        assert_eq!(" Import ".parse::<Strategy>().unwrap(), Strategy::Import);
        assert!(matches!(
            "upsert".parse::<Strategy>(),
            Err(BizsyncError::InvalidStrategy(s)) if s == "upsert"
        ));
    }

    #[test]
    fn test_strategy_default_is_merge() {
        assert_eq!(Strategy::default(), Strategy::Merge);
        assert!(!Strategy::Merge.may_create());
        assert!(Strategy::Import.may_create());
    }

    #[test]
    fn test_strategy_from_file_name() {
        assert_eq!(Strategy::from_file_name("@import-1700000000.csv"), Some(Strategy::Import));
        assert_eq!(Strategy::from_file_name("@merge-1700000000.csv"), Some(Strategy::Merge));
        assert_eq!(Strategy::from_file_name("companies.csv"), None);
    }

    #[test]
    fn test_record_serialization_skips_absent_fields() {
        let record = Record::new("Fakeblock", Some("90776"), None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "Fakeblock");
        assert_eq!(json["zip"], "90776");
        assert!(json.get("website").is_none());
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Outcome::Ambiguous).unwrap(), "ambiguous");
        assert_eq!(Outcome::Created.to_string(), "created");
    }
}
