// TabularDocument -> legacy xls bytes
//
// A BIFF8 workbook stream with one worksheet, wrapped in a compound file.
// Only the records a reader needs to recover cell values are written:
// workbook globals (BOF, CODEPAGE, WINDOW1, FONT, XF, STYLE, BOUNDSHEET,
// EOF) followed by the sheet substream (BOF, DIMENSIONS, cells, WINDOW2,
// EOF). Strings are stored inline as LABEL records so no shared string
// table is needed.

use cellvault_engine::{CellValue, TabularDocument};

use crate::cfb;
use crate::error::CodecError;
use crate::DEFAULT_SHEET_NAME;

/// BIFF8 sheet limits
const MAX_ROWS: usize = 65_536;
const MAX_COLS: usize = 256;

/// Largest record payload before a CONTINUE would be required
const MAX_RECORD_DATA: usize = 8224;
/// UTF-16 units that fit in one LABEL record (8224 - 6 cell header - 3 string header) / 2
const MAX_LABEL_UNITS: usize = 4107;

const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const CODEPAGE: u16 = 0x0042;
const WINDOW1: u16 = 0x003D;
const FONT: u16 = 0x0031;
const XF: u16 = 0x00E0;
const STYLE: u16 = 0x0293;
const BOUNDSHEET: u16 = 0x0085;
const DIMENSIONS: u16 = 0x0200;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOLERR: u16 = 0x0205;
const WINDOW2: u16 = 0x023E;

const BIFF8: u16 = 0x0600;
const SUBSTREAM_GLOBALS: u16 = 0x0005;
const SUBSTREAM_WORKSHEET: u16 = 0x0010;
const CODEPAGE_UTF16: u16 = 1200;

/// 15 style XFs precede the first cell XF
const CELL_XF: u16 = 15;

pub fn encode(doc: &TabularDocument) -> Result<Vec<u8>, CodecError> {
    if doc.row_count() + 1 > MAX_ROWS {
        return Err(CodecError::Encode(format!(
            "{} rows exceed the xls limit of {}",
            doc.row_count(),
            MAX_ROWS - 1
        )));
    }
    if doc.column_count() > MAX_COLS {
        return Err(CodecError::Encode(format!(
            "{} columns exceed the xls limit of {}",
            doc.column_count(),
            MAX_COLS
        )));
    }

    let mut stream = Vec::new();
    let boundsheet_pos = write_globals(&mut stream)?;

    // BOUNDSHEET carries the absolute offset of the sheet's BOF
    let sheet_offset = stream.len() as u32;
    stream[boundsheet_pos..boundsheet_pos + 4].copy_from_slice(&sheet_offset.to_le_bytes());

    write_sheet(&mut stream, doc)?;

    let bytes = cfb::write_single_stream("Workbook", &stream)?;
    log::debug!(
        "encoded xls workbook: {} columns, {} rows, {} bytes",
        doc.column_count(),
        doc.row_count(),
        bytes.len()
    );
    Ok(bytes)
}

/// Writes the workbook globals and returns the stream offset of the
/// BOUNDSHEET position field, to be patched once the sheet offset is known.
fn write_globals(out: &mut Vec<u8>) -> Result<usize, CodecError> {
    write_bof(out, SUBSTREAM_GLOBALS)?;
    record(out, CODEPAGE, &CODEPAGE_UTF16.to_le_bytes())?;
    write_window1(out)?;

    // Readers expect at least five fonts; index 4 is never referenced
    for _ in 0..5 {
        write_font(out)?;
    }
    for _ in 0..CELL_XF {
        write_xf(out, true)?;
    }
    write_xf(out, false)?;

    // Normal style bound to XF 0
    let mut style = Vec::with_capacity(4);
    style.extend_from_slice(&0x8000u16.to_le_bytes());
    style.extend_from_slice(&[0x00, 0xFF]);
    record(out, STYLE, &style)?;

    let position_field = out.len() + 4;
    write_boundsheet(out, DEFAULT_SHEET_NAME)?;

    record(out, EOF, &[])?;
    Ok(position_field)
}

fn write_sheet(out: &mut Vec<u8>, doc: &TabularDocument) -> Result<(), CodecError> {
    write_bof(out, SUBSTREAM_WORKSHEET)?;

    let used_rows = if doc.column_count() == 0 { 0 } else { doc.row_count() + 1 };
    let mut dims = Vec::with_capacity(14);
    dims.extend_from_slice(&0u32.to_le_bytes());
    dims.extend_from_slice(&(used_rows as u32).to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    dims.extend_from_slice(&(doc.column_count() as u16).to_le_bytes());
    dims.extend_from_slice(&0u16.to_le_bytes());
    record(out, DIMENSIONS, &dims)?;

    for (col, name) in doc.column_names().iter().enumerate() {
        write_label(out, 0, col as u16, name)?;
    }
    for (row_idx, row) in doc.rows().enumerate() {
        let row16 = (row_idx + 1) as u16;
        for (col, value) in row.iter().enumerate() {
            let col16 = col as u16;
            match value {
                CellValue::Empty => {}
                CellValue::Text(s) => write_label(out, row16, col16, s)?,
                CellValue::Number(n) => write_number(out, row16, col16, *n)?,
                CellValue::Bool(b) => write_boolerr(out, row16, col16, *b)?,
            }
        }
    }

    write_window2(out)?;
    record(out, EOF, &[])
}

fn record(out: &mut Vec<u8>, id: u16, data: &[u8]) -> Result<(), CodecError> {
    if data.len() > MAX_RECORD_DATA {
        return Err(CodecError::Encode(format!(
            "record 0x{id:04X} payload of {} bytes is too large",
            data.len()
        )));
    }
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    Ok(())
}

fn write_bof(out: &mut Vec<u8>, substream: u16) -> Result<(), CodecError> {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&BIFF8.to_le_bytes());
    data.extend_from_slice(&substream.to_le_bytes());
    data.extend_from_slice(&0x0DBBu16.to_le_bytes()); // build id
    data.extend_from_slice(&0x07CCu16.to_le_bytes()); // build year
    data.extend_from_slice(&0u32.to_le_bytes()); // file history
    data.extend_from_slice(&6u32.to_le_bytes()); // lowest BIFF version
    record(out, BOF, &data)
}

fn write_window1(out: &mut Vec<u8>) -> Result<(), CodecError> {
    let fields: [u16; 9] = [0, 0, 0x3000, 0x1E00, 0x0038, 0, 0, 1, 0x0258];
    let data: Vec<u8> = fields.iter().flat_map(|f| f.to_le_bytes()).collect();
    record(out, WINDOW1, &data)
}

fn write_font(out: &mut Vec<u8>) -> Result<(), CodecError> {
    const NAME: &[u8] = b"Arial";
    let mut data = Vec::with_capacity(16 + NAME.len());
    data.extend_from_slice(&200u16.to_le_bytes()); // 10pt in twips
    data.extend_from_slice(&0u16.to_le_bytes()); // attributes
    data.extend_from_slice(&0x7FFFu16.to_le_bytes()); // automatic color
    data.extend_from_slice(&400u16.to_le_bytes()); // normal weight
    data.extend_from_slice(&0u16.to_le_bytes()); // escapement
    data.extend_from_slice(&[0, 0, 0, 0]); // underline, family, charset, reserved
    data.push(NAME.len() as u8);
    data.push(0x00); // compressed 8-bit name
    data.extend_from_slice(NAME);
    record(out, FONT, &data)
}

fn write_xf(out: &mut Vec<u8>, style_xf: bool) -> Result<(), CodecError> {
    let mut data = Vec::with_capacity(20);
    data.extend_from_slice(&0u16.to_le_bytes()); // font 0
    data.extend_from_slice(&0u16.to_le_bytes()); // format 0, General
    // style XFs: locked, style bit, parent 0xFFF; cell XFs: locked, parent XF 0
    let type_prot: u16 = if style_xf { 0xFFF5 } else { 0x0001 };
    data.extend_from_slice(&type_prot.to_le_bytes());
    data.push(0x20); // bottom-aligned, general horizontal alignment
    data.push(0); // rotation
    data.push(0); // indent
    data.push(if style_xf { 0xF4 } else { 0x00 }); // used attribute groups
    data.extend_from_slice(&[0u8; 4]); // borders
    data.extend_from_slice(&[0u8; 4]); // border colors
    data.extend_from_slice(&0x20C0u16.to_le_bytes()); // default pattern colors
    record(out, XF, &data)
}

fn write_boundsheet(out: &mut Vec<u8>, name: &str) -> Result<(), CodecError> {
    let utf16: Vec<u16> = name.encode_utf16().collect();
    if utf16.is_empty() || utf16.len() > 31 {
        return Err(CodecError::Encode(format!("invalid sheet name '{name}'")));
    }
    let mut data = Vec::with_capacity(8 + utf16.len() * 2);
    data.extend_from_slice(&0u32.to_le_bytes()); // patched with the sheet offset
    data.push(0x00); // visible
    data.push(0x00); // worksheet
    data.push(utf16.len() as u8);
    data.push(0x01); // UTF-16LE
    for unit in utf16 {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    record(out, BOUNDSHEET, &data)
}

fn cell_header(row: u16, col: u16, capacity: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(6 + capacity);
    data.extend_from_slice(&row.to_le_bytes());
    data.extend_from_slice(&col.to_le_bytes());
    data.extend_from_slice(&CELL_XF.to_le_bytes());
    data
}

fn write_number(out: &mut Vec<u8>, row: u16, col: u16, value: f64) -> Result<(), CodecError> {
    let mut data = cell_header(row, col, 8);
    data.extend_from_slice(&value.to_le_bytes());
    record(out, NUMBER, &data)
}

fn write_boolerr(out: &mut Vec<u8>, row: u16, col: u16, value: bool) -> Result<(), CodecError> {
    let mut data = cell_header(row, col, 2);
    data.push(value as u8);
    data.push(0); // boolean, not an error code
    record(out, BOOLERR, &data)
}

fn write_label(out: &mut Vec<u8>, row: u16, col: u16, text: &str) -> Result<(), CodecError> {
    // Readers reject zero-length LABEL strings; blank cells are simply omitted
    if text.is_empty() {
        return Ok(());
    }
    let utf16: Vec<u16> = text.encode_utf16().collect();
    if utf16.len() > MAX_LABEL_UNITS {
        return Err(CodecError::Encode(format!(
            "text of {} characters at ({row}, {col}) exceeds the xls cell limit of {MAX_LABEL_UNITS}",
            utf16.len()
        )));
    }
    let mut data = cell_header(row, col, 3 + utf16.len() * 2);
    data.extend_from_slice(&(utf16.len() as u16).to_le_bytes());
    data.push(0x01); // UTF-16LE
    for unit in utf16 {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    record(out, LABEL, &data)
}

fn write_window2(out: &mut Vec<u8>) -> Result<(), CodecError> {
    let fields: [u16; 9] = [0x06B6, 0, 0, 0x0040, 0, 0, 0, 0, 0];
    let data: Vec<u8> = fields.iter().flat_map(|f| f.to_le_bytes()).collect();
    record(out, WINDOW2, &data)
}
