//! `cellvault-store` - where spreadsheets live and who may touch them.
//!
//! - `object_store`: blob storage (`MemoryStore`, `FsStore`), plus `s3` for
//!   S3-compatible endpoints
//! - `catalog`: file records (`SqliteCatalog`, `MemoryCatalog`)
//! - `identity`: users and bearer tokens (`SqliteIdentity`)
//! - `service`: the `FileService` handlers that tie them to the codec and
//!   the mutation engine

pub mod catalog;
pub mod error;
pub mod identity;
pub mod object_store;
pub mod s3;
pub mod service;

pub use catalog::{Catalog, FileRecord, MemoryCatalog, SqliteCatalog};
pub use error::{CatalogError, ErrorKind, IdentityError, ServiceError, StoreError};
pub use identity::{Identity, IdentityProvider, SqliteIdentity};
pub use object_store::{FsStore, MemoryStore, ObjectStore};
pub use s3::{S3Config, S3Store};
pub use service::{DocumentPreview, Download, FileService, FileSummary, ModifyOutcome};
