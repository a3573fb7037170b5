//! Column inference and row projection
//!
//! Uploaded files have no header row and no fixed column order. The first row
//! in which every required field can be recognised fixes the position of each
//! field for the whole file; every row (that one included) is then projected
//! through that mapping and kept only if its required cells still match.

use std::collections::BTreeMap;

use bizsync_common::types::Record;
use regex::Regex;

use super::columns::{ColumnSpec, NAME_FIELD, WEBSITE_FIELD, ZIP_FIELD};
use super::error::{ImportError, ImportResult};

/// A raw row of cells
pub type Row = Vec<String>;

/// Field values projected out of one row
pub type FieldValues = BTreeMap<String, String>;

/// Where a field lives in every row of the file
#[derive(Debug, Clone)]
pub struct ColumnPosition {
    pub field: String,
    pub position: usize,
    pub required: bool,
    pub pattern: Regex,
}

/// Column positions inferred for one file
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    positions: Vec<ColumnPosition>,
}

impl ColumnMapping {
    pub fn positions(&self) -> &[ColumnPosition] {
        &self.positions
    }

    pub fn position_of(&self, field: &str) -> Option<usize> {
        self.positions
            .iter()
            .find(|p| p.field == field)
            .map(|p| p.position)
    }

    /// Project a row through the mapping.
    ///
    /// Returns `None` when a required cell is missing or no longer matches its
    /// pattern. Optional cells that are missing or do not match are left out.
    pub fn project(&self, row: &[String]) -> Option<FieldValues> {
        let mut values = FieldValues::new();

        for column in &self.positions {
            match row.get(column.position) {
                Some(cell) if column.pattern.is_match(cell) => {
                    values.insert(column.field.clone(), cell.clone());
                },
                _ if column.required => return None,
                _ => {},
            }
        }

        Some(values)
    }
}

/// Infer the column mapping from the first row that satisfies every required
/// descriptor. Returns `None` when no such row exists.
pub fn infer_columns(rows: &[Row], spec: &ColumnSpec) -> Option<ColumnMapping> {
    rows.iter().find_map(|row| infer_from_row(row, spec))
}

fn infer_from_row(row: &[String], spec: &ColumnSpec) -> Option<ColumnMapping> {
    let mut positions = Vec::new();

    for descriptor in spec.iter() {
        match row.iter().position(|cell| descriptor.accepts(cell)) {
            Some(position) => positions.push(ColumnPosition {
                field: descriptor.field.clone(),
                position,
                required: descriptor.required,
                pattern: descriptor.pattern.clone(),
            }),
            None if descriptor.required => return None,
            None => {},
        }
    }

    Some(ColumnMapping { positions })
}

/// Turn raw rows into validated records.
///
/// # Errors
///
/// `EmptyInput` when there are no rows, when the first row is a single empty
/// cell, or when no row satisfies the required columns. Rows failing
/// validation are dropped, not reported.
pub fn normalize(rows: &[Row], spec: &ColumnSpec) -> ImportResult<Vec<Record>> {
    let Some(first) = rows.first() else {
        return Err(ImportError::EmptyInput("no rows".to_string()));
    };
    if first.len() == 1 && first[0].is_empty() {
        return Err(ImportError::EmptyInput("first row is blank".to_string()));
    }

    let mapping = infer_columns(rows, spec).ok_or_else(|| {
        ImportError::EmptyInput("no row satisfies the required columns".to_string())
    })?;

    tracing::debug!(
        columns = ?mapping
            .positions()
            .iter()
            .map(|p| (p.field.as_str(), p.position))
            .collect::<Vec<_>>(),
        "Inferred column positions"
    );

    let records = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let record = mapping.project(row).and_then(into_record);
            if record.is_none() {
                tracing::debug!(row = index, "Dropping row that fails required columns");
            }
            record
        })
        .collect();

    Ok(records)
}

fn into_record(mut values: FieldValues) -> Option<Record> {
    Some(Record {
        name: values.remove(NAME_FIELD)?,
        zip: values.remove(ZIP_FIELD),
        website: values.remove(WEBSITE_FIELD),
    })
}
