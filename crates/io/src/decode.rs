// Spreadsheet bytes -> TabularDocument
//
// Both containers are read through calamine. Only the first worksheet is
// used; its first used row is the header, every later row is data.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Sheets, Xls, Xlsx};
use cellvault_engine::{CellValue, TabularDocument};

use crate::error::CodecError;
use crate::format::SpreadsheetFormat;

/// Decode a spreadsheet blob. The container is detected from the bytes,
/// never from a file name.
pub fn decode(bytes: &[u8]) -> Result<TabularDocument, CodecError> {
    let format = SpreadsheetFormat::sniff(bytes)?;
    let cursor = Cursor::new(bytes);

    let mut workbook: Sheets<Cursor<&[u8]>> = match format {
        SpreadsheetFormat::Xls => Sheets::Xls(
            Xls::new(cursor)
                .map_err(|e| CodecError::UnsupportedFormat(format!("cannot open xls workbook: {e}")))?,
        ),
        SpreadsheetFormat::Xlsx => Sheets::Xlsx(
            Xlsx::new(cursor)
                .map_err(|e| CodecError::UnsupportedFormat(format!("cannot open xlsx workbook: {e}")))?,
        ),
    };

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CodecError::MalformedDocument("workbook contains no sheets".to_string()))?
        .map_err(|e| CodecError::MalformedDocument(format!("cannot read first sheet: {e}")))?;

    let doc = range_to_document(&range)?;
    log::debug!(
        "decoded {} workbook: {} columns, {} rows",
        format.extension(),
        doc.column_count(),
        doc.row_count()
    );
    Ok(doc)
}

fn range_to_document(range: &Range<Data>) -> Result<TabularDocument, CodecError> {
    let mut rows = range.rows();

    // A sheet with no cells at all is an empty table, not a missing header.
    let Some(header) = rows.next() else {
        return Ok(TabularDocument::default());
    };

    let columns = header_names(header)?;
    let mut doc = TabularDocument::new(columns)
        .map_err(|e| CodecError::MalformedDocument(e.to_string()))?;

    for row in rows {
        let cells: Vec<CellValue> = row.iter().map(cell_value).collect();
        doc.push_row(cells)
            .map_err(|e| CodecError::MalformedDocument(e.to_string()))?;
    }

    doc.trim_trailing_empty_rows();
    Ok(doc)
}

fn header_names(header: &[Data]) -> Result<Vec<String>, CodecError> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len());

    for (idx, cell) in header.iter().enumerate() {
        let name = cell_value(cell).to_string();
        if name.trim().is_empty() {
            return Err(CodecError::MalformedDocument(format!(
                "column {} has no header",
                idx + 1
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(CodecError::MalformedDocument(format!(
                "duplicate header '{name}'"
            )));
        }
        names.push(name);
    }

    Ok(names)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Date/time cells keep their serial value; number formats are not carried
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}
