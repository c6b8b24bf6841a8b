//! Spreadsheet bytes → ordered raw records.
//!
//! The first worksheet is read with calamine, which auto-detects xlsx, xlsb,
//! xls and ods. Its first non-empty row names the columns; every later row
//! that holds at least one value becomes a [`RawRecord`].

use crate::error::BatchError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::Timelike;
use std::io::Cursor;
use tracing::debug;

/// A single scalar from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

/// One data row as (column → value) pairs, in column order.
///
/// Empty and error cells are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    cells: Vec<(String, CellValue)>,
}

impl RawRecord {
    /// Add a cell. A key already present keeps its first value.
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        if self.get(&column).is_none() {
            self.cells.push((column, value));
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Decode a workbook and return one record per data row of its first sheet.
///
/// A sheet with a header but no data rows yields `Ok(vec![])`; deciding
/// whether that is an error is left to the caller.
///
/// # Errors
/// [`BatchError::UnreadableTable`] when the bytes are not a workbook, the
/// workbook has no sheets, or the first sheet cannot be read.
pub fn parse_table(bytes: &[u8]) -> Result<Vec<RawRecord>, BatchError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| BatchError::UnreadableTable {
            detail: e.to_string(),
        })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BatchError::UnreadableTable {
            detail: "workbook has no sheets".to_string(),
        })?
        .map_err(|e| BatchError::UnreadableTable {
            detail: e.to_string(),
        })?;

    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|cell| cell_value(cell).is_none()));

    let Some(header_row) = rows.next() else {
        debug!("First sheet is empty");
        return Ok(Vec::new());
    };

    // Blank headers and repeated names map to `None`: the first column wins.
    let mut headers: Vec<Option<String>> = Vec::with_capacity(header_row.len());
    for cell in header_row {
        let name = header_name(cell).filter(|n| !headers.iter().flatten().any(|h| h == n));
        headers.push(name);
    }

    let mut records = Vec::new();
    for row in rows {
        let mut record = RawRecord::default();
        for (header, cell) in headers.iter().zip(row) {
            if let (Some(name), Some(value)) = (header, cell_value(cell)) {
                record.insert(name.as_str(), value);
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }

    debug!(
        "Parsed {} records across {} columns",
        records.len(),
        headers.iter().flatten().count()
    );
    Ok(records)
}

fn header_name(cell: &Data) -> Option<String> {
    let name = match cell_value(cell)? {
        CellValue::Text(s) => s,
        CellValue::Number(n) => n.to_string(),
    };
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Text(b.to_string())),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(ts) if ts.hour() == 0 && ts.minute() == 0 => {
                CellValue::Text(ts.format("%d/%m/%Y").to_string())
            }
            Some(ts) => CellValue::Text(ts.format("%d/%m/%Y %H:%M").to_string()),
            None => CellValue::Number(dt.as_f64()),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn xlsx(build: impl FnOnce(&mut rust_xlsxwriter::Worksheet)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        build(sheet);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_rows_in_order_with_typed_cells() {
        let bytes = xlsx(|s| {
            s.write_string(0, 0, "id").unwrap();
            s.write_string(0, 1, "Valor").unwrap();
            s.write_string(0, 2, "Cidade").unwrap();
            s.write_string(1, 0, "NP-1").unwrap();
            s.write_number(1, 1, 2500.5).unwrap();
            s.write_string(1, 2, "Recife").unwrap();
            s.write_string(2, 0, "NP-2").unwrap();
            s.write_string(2, 1, "100").unwrap();
        });

        let records = parse_table(&bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&CellValue::Text("NP-1".into())));
        assert_eq!(records[0].get("Valor"), Some(&CellValue::Number(2500.5)));
        assert_eq!(records[1].get("Valor"), Some(&CellValue::Text("100".into())));
        // Absent cells are absent keys.
        assert_eq!(records[1].get("Cidade"), None);
        assert_eq!(records[1].len(), 2);
    }

    #[test]
    fn header_only_sheet_is_empty_not_an_error() {
        let bytes = xlsx(|s| {
            s.write_string(0, 0, "id").unwrap();
            s.write_string(0, 1, "Valor").unwrap();
        });
        assert!(parse_table(&bytes).unwrap().is_empty());
    }

    #[test]
    fn blank_rows_are_skipped() {
        let bytes = xlsx(|s| {
            s.write_string(0, 0, "id").unwrap();
            s.write_string(1, 0, "a").unwrap();
            s.write_string(3, 0, "b").unwrap();
        });
        let ids: Vec<_> = parse_table(&bytes)
            .unwrap()
            .iter()
            .map(|r| r.get("id").cloned())
            .collect();
        assert_eq!(
            ids,
            vec![
                Some(CellValue::Text("a".into())),
                Some(CellValue::Text("b".into()))
            ]
        );
    }

    #[test]
    fn duplicate_headers_keep_first_column() {
        let bytes = xlsx(|s| {
            s.write_string(0, 0, "Cidade").unwrap();
            s.write_string(0, 1, "Cidade").unwrap();
            s.write_string(1, 0, "Natal").unwrap();
            s.write_string(1, 1, "Olinda").unwrap();
        });
        let records = parse_table(&bytes).unwrap();
        assert_eq!(records[0].get("Cidade"), Some(&CellValue::Text("Natal".into())));
        assert_eq!(records[0].len(), 1);
    }

    #[test]
    fn dates_and_booleans_become_text() {
        let date_format = Format::new().set_num_format("dd/mm/yyyy");
        let bytes = xlsx(|s| {
            s.write_string(0, 0, "Vencimento").unwrap();
            s.write_string(0, 1, "Pago").unwrap();
            let date = ExcelDateTime::from_ymd(2025, 3, 15).unwrap();
            s.write_datetime_with_format(1, 0, &date, &date_format).unwrap();
            s.write_boolean(1, 1, true).unwrap();
        });
        let records = parse_table(&bytes).unwrap();
        assert_eq!(
            records[0].get("Vencimento"),
            Some(&CellValue::Text("15/03/2025".into()))
        );
        assert_eq!(records[0].get("Pago"), Some(&CellValue::Text("true".into())));
    }

    #[test]
    fn garbage_bytes_are_unreadable() {
        let err = parse_table(b"definitely not a spreadsheet").unwrap_err();
        assert!(matches!(err, BatchError::UnreadableTable { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn raw_record_insert_keeps_first_value() {
        let mut r = RawRecord::default();
        r.insert("id", CellValue::Number(1.0));
        r.insert("id", CellValue::Number(2.0));
        assert_eq!(r.get("id"), Some(&CellValue::Number(1.0)));
        assert_eq!(r.iter().count(), 1);
    }
}
