//! Delimited (CSV) input.

use std::{io::Read, path::Path};

use crate::source::{RawRow, SourceError};

/// Reads a CSV file into header-keyed rows.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid CSV.
pub fn read_csv(path: &Path) -> Result<Vec<RawRow>, SourceError> {
    let file = std::fs::File::open(path)?;
    read_delimited(file)
}

/// Reads delimited text into header-keyed rows.
///
/// The first record is the header row. Cells are trimmed, rows may be ragged,
/// and rows whose cells are all blank are skipped.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the input is not valid CSV.
pub fn read_delimited<R: Read>(input: R) -> Result<Vec<RawRow>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.to_string(), cell.to_string()))
            .collect();
        rows.push(row);
    }

    tracing::debug!(rows = rows.len(), "read delimited input");
    Ok(rows)
}
