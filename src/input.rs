//! # Record Input
//!
//! Reads `ResourceRecord`s from CSV: column 0 is the resource path, column 1
//! the tenant ID. Extra columns are ignored and fields are trimmed.
//!
//! A row with fewer than two fields is a precondition failure for the whole
//! run. A row with a bad path is not; the path is reported per record by the
//! batch runner.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::controller::types::ResourceRecord;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: expected a resource path and a tenant ID, found {found} field(s)")]
    MissingFields { line: u64, found: usize },
}

/// Read records in input order
///
/// # Errors
///
/// Returns an [`InputError`] on malformed CSV or a short row.
pub fn read_records<R: Read>(reader: R, has_headers: bool) -> Result<Vec<ResourceRecord>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, csv::Position::line);

        if row.iter().all(str::is_empty) {
            continue;
        }
        if row.len() < 2 {
            return Err(InputError::MissingFields {
                line,
                found: row.len(),
            });
        }

        records.push(ResourceRecord::new(line, &row[0], &row[1]));
    }

    Ok(records)
}

/// Read records from a CSV file
///
/// # Errors
///
/// Returns an error if the file cannot be opened or parsed.
pub fn load_records(path: &Path, has_headers: bool) -> Result<Vec<ResourceRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
    read_records(std::io::BufReader::new(file), has_headers)
        .with_context(|| format!("Failed to read records from {}", path.display()))
}
