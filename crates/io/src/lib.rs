//! `cellvault-io` - spreadsheet containers to and from `TabularDocument`.
//!
//! Reading goes through calamine for both containers. Writing uses
//! rust_xlsxwriter for xlsx and a small BIFF8 writer for legacy xls.

mod cfb;
pub mod decode;
pub mod error;
pub mod format;
pub mod xls;
pub mod xlsx;

use cellvault_engine::TabularDocument;

pub use decode::decode;
pub use error::CodecError;
pub use format::{has_supported_extension, SpreadsheetFormat, SUPPORTED_EXTENSIONS};

/// Name of the single worksheet written by the encoders
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Encode a document in the given container.
pub fn encode(doc: &TabularDocument, format: SpreadsheetFormat) -> Result<Vec<u8>, CodecError> {
    match format {
        SpreadsheetFormat::Xls => xls::encode(doc),
        SpreadsheetFormat::Xlsx => xlsx::encode(doc),
    }
}

/// Encode a document in the container implied by `file_name`
/// (xlsx unless the name ends in `.xls`).
pub fn encode_for_name(doc: &TabularDocument, file_name: &str) -> Result<Vec<u8>, CodecError> {
    encode(doc, SpreadsheetFormat::for_output(file_name))
}
