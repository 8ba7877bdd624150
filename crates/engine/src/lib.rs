//! `cellvault-engine` - tabular document model and structured edits.
//!
//! Pure crate: no container formats, no storage.

pub mod cell;
pub mod document;
pub mod error;
pub mod mutation;

pub use cell::CellValue;
pub use document::TabularDocument;
pub use error::{DocumentError, MutationError};
pub use mutation::{apply, apply_request, Mutation, MutationKind, MutationRequest};
