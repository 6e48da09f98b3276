//! Spreadsheet to CSV conversion with calamine.

use crate::error::{ConversionError, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::path::Path;
use tracing::debug;

/// Write the first worksheet of `input` as CSV to `output`.
///
/// The first row is treated as the header. Returns the number of data rows
/// written (all rows but the header).
pub fn xlsx_to_csv(input: &Path, output: &Path) -> Result<usize> {
    let mut workbook: Xlsx<_> = open_workbook(input)?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ConversionError::ConversionFailed {
            path: input.to_path_buf(),
            message: "workbook has no worksheets".to_string(),
        })?;
    let range = workbook.worksheet_range(&sheet)?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(false)
        .from_path(output)?;

    let mut rows = 0usize;
    for row in range.rows() {
        writer.write_record(row.iter().map(cell_text))?;
        rows += 1;
    }
    writer.flush()?;

    let data_rows = rows.saturating_sub(1);
    debug!(
        "Wrote {} data rows from sheet '{}' of {:?}",
        data_rows, sheet, input
    );
    Ok(data_rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_sheet(path: &Path, rows: &[&[&str]]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_xlsx_to_csv_counts_data_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("people.xlsx");
        let output = dir.path().join("people.csv");
        write_sheet(
            &input,
            &[&["name", "city"], &["Ada", "London"], &["Linus", "Helsinki"]],
        );

        let rows = xlsx_to_csv(&input, &output).unwrap();
        assert_eq!(rows, 2);

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["name,city", "Ada,London", "Linus,Helsinki"]);
    }

    #[test]
    fn test_xlsx_to_csv_quotes_commas() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.xlsx");
        let output = dir.path().join("q.csv");
        write_sheet(&input, &[&["label"], &["a, b"]]);

        xlsx_to_csv(&input, &output).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("\"a, b\""));
    }

    #[test]
    fn test_numbers_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("n.xlsx");
        let output = dir.path().join("n.csv");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "qty").unwrap();
        sheet.write_number(1, 0, 42).unwrap();
        sheet.write_number(2, 0, 2.5).unwrap();
        workbook.save(&input).unwrap();

        assert_eq!(xlsx_to_csv(&input, &output).unwrap(), 2);
        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["qty", "42", "2.5"]);
    }

    #[test]
    fn test_malformed_workbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.xlsx");
        std::fs::write(&input, b"this is not a zip archive").unwrap();
        let err = xlsx_to_csv(&input, &dir.path().join("broken.csv")).unwrap_err();
        assert!(matches!(err, ConversionError::SpreadsheetError(_)));
    }
}
