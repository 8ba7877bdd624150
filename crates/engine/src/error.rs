use std::fmt;

/// Document-level validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentError {
    /// Column name is not in the header.
    UnknownColumn(String),
    /// Column name is already in the header.
    DuplicateColumn(String),
    /// Row index outside `[0, row_count)`. Negative indexes land here too.
    OutOfRange { row: i64, row_count: usize },
    /// Row has more cells than the header has columns.
    RowTooWide { width: usize, columns: usize },
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn(name) => write!(f, "Column '{name}' not found."),
            Self::DuplicateColumn(name) => write!(f, "Column '{name}' already exists."),
            Self::OutOfRange { row, row_count } => {
                write!(f, "Row index {row} is out of range (document has {row_count} rows).")
            }
            Self::RowTooWide { width, columns } => {
                write!(f, "Row has {width} cells but the header has {columns} columns.")
            }
        }
    }
}

impl std::error::Error for DocumentError {}

/// Rejection of a mutation request. The document is unchanged whenever
/// one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationError {
    /// Unknown kind, or a field required by the kind is missing or malformed.
    InvalidRequest(String),
    /// The request was well-formed but does not fit the document.
    Document(DocumentError),
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest(msg) => f.write_str(msg),
            Self::Document(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MutationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Document(e) => Some(e),
            Self::InvalidRequest(_) => None,
        }
    }
}

impl From<DocumentError> for MutationError {
    fn from(e: DocumentError) -> Self {
        MutationError::Document(e)
    }
}
