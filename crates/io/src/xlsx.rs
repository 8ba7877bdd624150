// TabularDocument -> xlsx bytes
//
// One worksheet: header row, then data rows in document order. Numbers and
// booleans are written as typed cells; empty cells are left blank.

use cellvault_engine::{CellValue, TabularDocument};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::CodecError;
use crate::DEFAULT_SHEET_NAME;

/// Excel's row and column limits for the xlsx container
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

pub fn encode(doc: &TabularDocument) -> Result<Vec<u8>, CodecError> {
    // +1 for the header row
    if doc.row_count() + 1 > MAX_ROWS {
        return Err(CodecError::Encode(format!(
            "{} rows exceed the xlsx limit of {}",
            doc.row_count(),
            MAX_ROWS - 1
        )));
    }
    if doc.column_count() > MAX_COLS {
        return Err(CodecError::Encode(format!(
            "{} columns exceed the xlsx limit of {}",
            doc.column_count(),
            MAX_COLS
        )));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(DEFAULT_SHEET_NAME)
        .map_err(|e| CodecError::Encode(format!("Failed to create sheet: {e}")))?;

    for (col, name) in doc.column_names().iter().enumerate() {
        worksheet
            .write_string(0, col as u16, name)
            .map_err(|e| CodecError::Encode(format!("Failed to write header '{name}': {e}")))?;
    }

    for (row_idx, row) in doc.rows().enumerate() {
        let row32 = (row_idx + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            write_cell(worksheet, row32, col as u16, value)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    log::debug!(
        "encoded xlsx workbook: {} columns, {} rows, {} bytes",
        doc.column_count(),
        doc.row_count(),
        bytes.len()
    );
    Ok(bytes)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
) -> Result<(), CodecError> {
    let result = match value {
        CellValue::Empty => return Ok(()),
        CellValue::Text(s) => worksheet.write_string(row, col, s),
        CellValue::Number(n) => worksheet.write_number(row, col, *n),
        CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
    };
    result
        .map(|_| ())
        .map_err(|e| CodecError::Encode(format!("Failed to write cell ({}, {}): {}", row, col, e)))
}
