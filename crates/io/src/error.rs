use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Bytes are not a recognized spreadsheet container.
    UnsupportedFormat(String),
    /// Container opened but the sheet is not a usable table (missing or
    /// duplicated headers, unreadable sheet).
    MalformedDocument(String),
    /// Document cannot be written in the requested container.
    Encode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(msg) => write!(f, "unsupported format: {msg}"),
            Self::MalformedDocument(msg) => write!(f, "malformed document: {msg}"),
            Self::Encode(msg) => write!(f, "cannot encode document: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<rust_xlsxwriter::XlsxError> for CodecError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        CodecError::Encode(e.to_string())
    }
}
