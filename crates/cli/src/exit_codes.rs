//! CLI Exit Code Registry
//!
//! Single source of truth for `cvault` exit codes. Scripts branch on these,
//! so a code never changes meaning once released.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified, internal)                     |
//! | 2    | Usage error (bad args, unreadable input file, bad config) |
//! | 3    | Unauthorized (no token, revoked token, bad credentials)   |
//! | 4    | File not found                                            |
//! | 5    | File belongs to another user                              |
//! | 6    | Invalid request or unsupported file extension             |
//! | 7    | Document validation (unknown/duplicate column, range)     |
//! | 8    | Corrupt or unsupported spreadsheet content                |
//! | 9    | Storage unavailable                                       |

use cellvault_store::ErrorKind;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input file, invalid configuration.
pub const EXIT_USAGE: u8 = 2;

/// No usable token, or the identity provider rejected it.
pub const EXIT_UNAUTHORIZED: u8 = 3;

/// No file record with the requested id.
pub const EXIT_NOT_FOUND: u8 = 4;

/// The file record exists but is owned by someone else.
pub const EXIT_FORBIDDEN: u8 = 5;

/// Malformed edit request, or a file name without .xls/.xlsx.
pub const EXIT_INVALID_REQUEST: u8 = 6;

/// The edit does not fit the document (unknown column, duplicate column,
/// row out of range).
pub const EXIT_DOCUMENT: u8 = 7;

/// Stored or produced bytes are not a readable spreadsheet.
pub const EXIT_CORRUPT: u8 = 8;

/// Object store or catalog could not be reached.
pub const EXIT_STORAGE: u8 = 9;

/// Map a service error kind to its exit code.
pub fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Unauthorized => EXIT_UNAUTHORIZED,
        ErrorKind::NotFound => EXIT_NOT_FOUND,
        ErrorKind::Forbidden => EXIT_FORBIDDEN,
        ErrorKind::InvalidRequest | ErrorKind::UnsupportedExtension => EXIT_INVALID_REQUEST,
        ErrorKind::UnknownColumn | ErrorKind::DuplicateColumn | ErrorKind::OutOfRange => {
            EXIT_DOCUMENT
        }
        ErrorKind::UnsupportedFormat | ErrorKind::MalformedDocument | ErrorKind::CorruptSource => {
            EXIT_CORRUPT
        }
        ErrorKind::StorageUnavailable => EXIT_STORAGE,
        ErrorKind::Internal => EXIT_ERROR,
    }
}
