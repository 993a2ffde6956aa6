//! Excel workbook input.

use std::path::Path;

use calamine::{Data, DataType, Reader, open_workbook_auto};

use crate::source::{RawRow, SourceError};

/// Reads the requirements sheet of a workbook into header-keyed rows.
///
/// The sheet is chosen by [`select_sheet`]. Cells are rendered as the
/// strings a reader would see, and empty rows are skipped.
///
/// # Errors
///
/// Returns [`SourceError::Spreadsheet`] if the workbook cannot be opened or
/// has no sheets.
pub fn read_workbook(path: &Path) -> Result<Vec<RawRow>, SourceError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| SourceError::Spreadsheet(e.to_string()))?;

    let names = workbook.sheet_names();
    let sheet = select_sheet(&names)
        .ok_or_else(|| SourceError::Spreadsheet("workbook has no sheets".to_string()))?
        .to_string();
    tracing::debug!(%sheet, "reading worksheet");

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| SourceError::Spreadsheet(format!("{sheet}: {e}")))?;

    Ok(rows_from_grid(
        range
            .rows()
            .map(|row| row.iter().map(render_cell).collect()),
    ))
}

/// Picks the sheet holding requirements.
///
/// The first sheet whose name contains "require" (case-insensitively) wins;
/// otherwise the first sheet is used.
#[must_use]
pub fn select_sheet(names: &[String]) -> Option<&str> {
    names
        .iter()
        .find(|name| name.to_lowercase().contains("require"))
        .or_else(|| names.first())
        .map(String::as_str)
}

/// Renders a cell the way it is displayed, rather than its raw value.
#[must_use]
pub fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            text.trim().to_string()
        }
        Data::Int(value) => value.to_string(),
        Data::Float(value) => value.to_string(),
        Data::Bool(value) => if *value { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(_) => cell.as_datetime().map_or_else(
            || cell.to_string(),
            |datetime| {
                if datetime.time() == chrono::NaiveTime::MIN {
                    datetime.format("%Y-%m-%d").to_string()
                } else {
                    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            },
        ),
        Data::Error(error) => error.to_string(),
    }
}

/// Keys each row after the first by the first row's headers.
pub(crate) fn rows_from_grid<I>(grid: I) -> Vec<RawRow>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut grid = grid.into_iter();
    let Some(headers) = grid.next() else {
        return Vec::new();
    };

    grid.filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .map(|cells| {
            headers
                .iter()
                .zip(cells)
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use calamine::Data;
    use test_case::test_case;

    use super::{render_cell, rows_from_grid, select_sheet};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test_case(&["Cover", "Requirements", "Notes"], Some("Requirements"); "named sheet")]
    #[test_case(&["Cover", "REQUIREMENT LIST"], Some("REQUIREMENT LIST"); "case insensitive")]
    #[test_case(&["Sheet1", "Sheet2"], Some("Sheet1"); "falls back to first")]
    #[test_case(&[], None; "no sheets")]
    fn picks_sheet(available: &[&str], expected: Option<&str>) {
        let available = names(available);
        assert_eq!(select_sheet(&available), expected);
    }

    #[test_case(&Data::Float(3.0), "3"; "whole float")]
    #[test_case(&Data::Float(2.5), "2.5"; "fractional float")]
    #[test_case(&Data::Int(12), "12"; "integer")]
    #[test_case(&Data::Bool(false), "FALSE"; "boolean")]
    #[test_case(&Data::String("  A.5.1 ".into()), "A.5.1"; "trimmed string")]
    #[test_case(&Data::Empty, ""; "empty")]
    fn renders_display_strings(cell: &Data, expected: &str) {
        assert_eq!(render_cell(cell), expected);
    }

    #[test]
    fn grid_rows_are_keyed_and_empty_rows_dropped() {
        let grid = vec![
            vec!["code".to_string(), "title".to_string(), String::new()],
            vec!["A.1".to_string(), "Access".to_string(), "ignored".to_string()],
            vec![String::new(), String::new(), String::new()],
        ];

        let rows = rows_from_grid(grid);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["code"], "A.1");
        assert_eq!(rows[0].len(), 2);
    }
}
