//! Column specifications
//!
//! A [`ColumnSpec`] describes which fields a headerless file is expected to
//! carry and how each field is recognised. The position of every field is not
//! known up front; it is inferred from the data by [`super::normalize`].

use std::collections::BTreeMap;

use bizsync_common::types::{Record, Strategy};
use regex::Regex;

use super::error::{ImportError, ImportResult};

/// Company name: letters (Latin-1 and Latin Extended-A included), spaces and `&,.'-`
pub const NAME_PATTERN: &str = r"^[ \x{00C0}-\x{01FF}a-zA-Z&,.'\-]+$";

/// Exactly five digits
pub const ZIP_PATTERN: &str = r"^[0-9]{5}$";

/// URL-shaped value with an optional `http`, `https` or `ftp` scheme
pub const WEBSITE_PATTERN: &str = r"^(?:(?:https?|ftp)://)?[\w/\-?=%.]+\.[\w/\-?=%.]+$";

pub const NAME_FIELD: &str = "name";
pub const ZIP_FIELD: &str = "zip";
pub const WEBSITE_FIELD: &str = "website";

/// One expected field of the input
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub field: String,
    pub required: bool,
    pub pattern: Regex,
}

impl ColumnDescriptor {
    pub fn new(field: impl Into<String>, required: bool, pattern: &str) -> ImportResult<Self> {
        Ok(Self {
            field: field.into(),
            required,
            pattern: Regex::new(pattern)?,
        })
    }

    /// Whether a cell value is recognised as this field
    pub fn accepts(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }
}

/// Field name to descriptor mapping, iterated in field-name order
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    descriptors: BTreeMap<String, ColumnDescriptor>,
}

impl ColumnSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a descriptor
    pub fn with(mut self, descriptor: ColumnDescriptor) -> Self {
        self.descriptors
            .insert(descriptor.field.clone(), descriptor);
        self
    }

    /// Column layout used for company uploads.
    ///
    /// `website` is only required when merging: a merge row without a website
    /// has nothing to contribute.
    pub fn companies(strategy: Strategy) -> ImportResult<Self> {
        Ok(Self::new()
            .with(ColumnDescriptor::new(NAME_FIELD, true, NAME_PATTERN)?)
            .with(ColumnDescriptor::new(ZIP_FIELD, true, ZIP_PATTERN)?)
            .with(ColumnDescriptor::new(
                WEBSITE_FIELD,
                strategy == Strategy::Merge,
                WEBSITE_PATTERN,
            )?))
    }

    pub fn get(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.descriptors.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.descriptors.values()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check a directly submitted record against this specification.
    ///
    /// Used for single-record submissions, where there is no row to drop.
    pub fn validate_record(&self, record: &Record) -> ImportResult<()> {
        let values = [
            (NAME_FIELD, Some(record.name.as_str())),
            (ZIP_FIELD, record.zip.as_deref()),
            (WEBSITE_FIELD, record.website.as_deref()),
        ];

        for (field, value) in values {
            let Some(descriptor) = self.get(field) else {
                continue;
            };
            match value {
                Some(v) if !descriptor.accepts(v) => {
                    return Err(ImportError::Validation(format!(
                        "{field} '{v}' does not match the expected format"
                    )));
                },
                None if descriptor.required => {
                    return Err(ImportError::Validation(format!("{field} is required")));
                },
                _ => {},
            }
        }

        Ok(())
    }
}
