// Error types for the storage layer and the file service.

use std::fmt;

use cellvault_engine::{DocumentError, MutationError};
use cellvault_io::CodecError;
use serde::Serialize;

/// Object store failure.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No blob under the key
    NotFound(String),
    /// Transport, permission, or backend failure
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(key) => write!(f, "No object stored under '{}'", key),
            StoreError::Unavailable(msg) => write!(f, "Object store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Metadata catalog failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    Database(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Database(msg) => write!(f, "Catalog error: {}", msg),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}

/// Identity provider failure.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityError {
    /// Token unknown or revoked
    InvalidToken,
    /// Wrong username or password
    InvalidCredentials,
    /// Username already registered
    UsernameTaken(String),
    /// Registration input rejected
    Invalid(String),
    Database(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::InvalidToken => write!(f, "Invalid or expired token."),
            IdentityError::InvalidCredentials => write!(f, "Invalid credentials."),
            IdentityError::UsernameTaken(name) => {
                write!(f, "A user with username '{}' already exists.", name)
            }
            IdentityError::Invalid(msg) => f.write_str(msg),
            IdentityError::Database(msg) => write!(f, "Identity store error: {}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}

impl From<rusqlite::Error> for IdentityError {
    fn from(e: rusqlite::Error) -> Self {
        IdentityError::Database(e.to_string())
    }
}

/// Distinguishing kind of a service failure, for callers that branch on
/// the failure rather than print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    UnsupportedExtension,
    UnsupportedFormat,
    MalformedDocument,
    CorruptSource,
    UnknownColumn,
    DuplicateColumn,
    OutOfRange,
    NotFound,
    Forbidden,
    Unauthorized,
    StorageUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::UnsupportedExtension => "unsupported_extension",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::MalformedDocument => "malformed_document",
            ErrorKind::CorruptSource => "corrupt_source",
            ErrorKind::UnknownColumn => "unknown_column",
            ErrorKind::DuplicateColumn => "duplicate_column",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a `FileService` operation. Every variant carries a message
/// fit to show the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    InvalidRequest(String),
    UnsupportedExtension(String),
    /// Freshly uploaded or re-encoded bytes are not a usable spreadsheet
    UnsupportedFormat(String),
    MalformedDocument(String),
    /// The stored blob cannot be decoded
    CorruptSource(String),
    Document(DocumentError),
    NotFound(String),
    Forbidden(String),
    Unauthorized(String),
    StorageUnavailable(String),
    /// Catalog or other backend failure with no user-facing cause
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ServiceError::UnsupportedExtension(_) => ErrorKind::UnsupportedExtension,
            ServiceError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ServiceError::MalformedDocument(_) => ErrorKind::MalformedDocument,
            ServiceError::CorruptSource(_) => ErrorKind::CorruptSource,
            ServiceError::Document(DocumentError::UnknownColumn(_)) => ErrorKind::UnknownColumn,
            ServiceError::Document(DocumentError::DuplicateColumn(_)) => ErrorKind::DuplicateColumn,
            ServiceError::Document(DocumentError::OutOfRange { .. }) => ErrorKind::OutOfRange,
            ServiceError::Document(DocumentError::RowTooWide { .. }) => ErrorKind::MalformedDocument,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Codec failure while decoding a blob that is already stored.
    pub(crate) fn corrupt(e: CodecError) -> Self {
        ServiceError::CorruptSource(format!("Stored file could not be read: {}", e))
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Document(e) => write!(f, "{}", e),
            ServiceError::InvalidRequest(msg)
            | ServiceError::UnsupportedExtension(msg)
            | ServiceError::UnsupportedFormat(msg)
            | ServiceError::MalformedDocument(msg)
            | ServiceError::CorruptSource(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Forbidden(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::StorageUnavailable(msg)
            | ServiceError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Document(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MutationError> for ServiceError {
    fn from(e: MutationError) -> Self {
        match e {
            MutationError::InvalidRequest(msg) => ServiceError::InvalidRequest(msg),
            MutationError::Document(d) => ServiceError::Document(d),
        }
    }
}

/// Codec failures on the write path (upload validation, re-encode).
impl From<CodecError> for ServiceError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::UnsupportedFormat(msg) => {
                ServiceError::UnsupportedFormat(format!("Unsupported spreadsheet format: {}", msg))
            }
            CodecError::MalformedDocument(msg) => {
                ServiceError::MalformedDocument(format!("Malformed spreadsheet: {}", msg))
            }
            // Only an edit can push a document past its container's limits
            CodecError::Encode(msg) => ServiceError::InvalidRequest(format!(
                "Change cannot be saved, the spreadsheet would exceed its file format limits: {}",
                msg
            )),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => {
                ServiceError::StorageUnavailable(format!("Stored object '{}' is missing.", key))
            }
            StoreError::Unavailable(msg) => {
                ServiceError::StorageUnavailable(format!("Storage unavailable: {}", msg))
            }
        }
    }
}

impl From<CatalogError> for ServiceError {
    fn from(e: CatalogError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

impl From<IdentityError> for ServiceError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken | IdentityError::InvalidCredentials => {
                ServiceError::Unauthorized(e.to_string())
            }
            IdentityError::UsernameTaken(_) | IdentityError::Invalid(_) => {
                ServiceError::InvalidRequest(e.to_string())
            }
            IdentityError::Database(msg) => ServiceError::Internal(msg),
        }
    }
}
