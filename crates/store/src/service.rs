//! File service: upload, list, download, inspect and modify stored
//! spreadsheets on behalf of an authenticated caller.
//!
//! The service owns no state beyond its two collaborators. Every request
//! decodes its own copy of the document; nothing is cached or locked, so
//! two concurrent modifications of the same file race and the last `put`
//! wins.
//!
//! Modify runs as a strict pipeline and stops at the first failure:
//!
//! ```text
//! resolve -> authorize -> extension -> parse request -> fetch -> decode
//!         -> apply -> encode -> verify -> put
//! ```
//!
//! Nothing is written until the new bytes are known to decode, so a
//! rejected edit or a codec failure leaves the stored blob untouched.

use std::sync::Arc;

use cellvault_engine::{apply, CellValue, MutationRequest, TabularDocument};
use cellvault_io::{decode, encode_for_name, has_supported_extension, SpreadsheetFormat};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::{Catalog, FileRecord};
use crate::error::ServiceError;
use crate::identity::Identity;
use crate::object_store::ObjectStore;

/// Catalog record as shown to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub id: i64,
    pub file_name: String,
    pub storage_key: String,
    pub upload_date: DateTime<Utc>,
    pub file_type: String,
    pub owner_username: String,
}

impl From<FileRecord> for FileSummary {
    fn from(r: FileRecord) -> Self {
        Self {
            id: r.id,
            file_name: r.logical_name,
            storage_key: r.storage_key,
            upload_date: r.created_at,
            file_type: r.content_type,
            owner_username: r.owner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifyOutcome {
    pub file: FileSummary,
    pub message: String,
}

/// First rows of a stored spreadsheet.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPreview {
    pub file: FileSummary,
    pub columns: Vec<String>,
    /// Total data rows in the document, not just the ones returned
    pub row_count: usize,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn Catalog>,
}

impl FileService {
    pub fn new(store: Arc<dyn ObjectStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    /// Store a new spreadsheet (or replace one with the same name) under
    /// `{username}/{file name}`. The blob is written before the record, so
    /// a record never points at a blob that was not stored.
    pub fn upload(
        &self,
        identity: &Identity,
        logical_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<FileSummary, ServiceError> {
        if bytes.is_empty() {
            return Err(ServiceError::InvalidRequest("No file provided.".into()));
        }

        let file_name = base_name(logical_name);
        if file_name.is_empty() {
            return Err(ServiceError::InvalidRequest("No file name provided.".into()));
        }
        let format = SpreadsheetFormat::from_file_name(file_name).ok_or_else(|| {
            ServiceError::UnsupportedExtension("Only XLS and XLSX files are allowed.".into())
        })?;

        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(format.content_type());

        let storage_key = format!("{}/{}", identity.username, file_name);
        self.store.put(&storage_key, bytes)?;
        let record = self
            .catalog
            .create(&identity.username, file_name, &storage_key, content_type)?;

        log::info!(
            "{} uploaded '{}' ({} bytes) as record {}",
            identity.username,
            file_name,
            bytes.len(),
            record.id
        );
        Ok(record.into())
    }

    /// The caller's files, newest first.
    pub fn list(&self, identity: &Identity) -> Result<Vec<FileSummary>, ServiceError> {
        let records = self.catalog.list_by_owner(&identity.username)?;
        Ok(records.into_iter().map(FileSummary::from).collect())
    }

    /// Stored bytes, unmodified.
    pub fn download(&self, identity: &Identity, id: i64) -> Result<Download, ServiceError> {
        let record = self.resolve(identity, id, "download")?;
        let bytes = self.store.get(&record.storage_key)?;
        Ok(Download {
            file_name: record.logical_name,
            content_type: record.content_type,
            bytes,
        })
    }

    /// Decode a stored file and return at most `max_rows` of its rows.
    pub fn inspect(
        &self,
        identity: &Identity,
        id: i64,
        max_rows: usize,
    ) -> Result<DocumentPreview, ServiceError> {
        let record = self.resolve(identity, id, "view")?;
        let doc = self.fetch_document(&record)?;

        Ok(DocumentPreview {
            columns: doc.column_names().to_vec(),
            row_count: doc.row_count(),
            rows: doc.rows().take(max_rows).map(<[CellValue]>::to_vec).collect(),
            file: record.into(),
        })
    }

    /// Apply one structured edit to a stored spreadsheet and write it back
    /// under the same key.
    pub fn modify(
        &self,
        identity: &Identity,
        id: i64,
        request: &MutationRequest,
    ) -> Result<ModifyOutcome, ServiceError> {
        let record = self.resolve(identity, id, "modify")?;

        if !has_supported_extension(&record.logical_name) {
            return Err(ServiceError::UnsupportedExtension(
                "Only XLS and XLSX files can be modified.".into(),
            ));
        }

        let mutation = request.parse()?;
        let mut doc = self.fetch_document(&record)?;
        let change = apply(&mut doc, &mutation)?;

        let bytes = encode_for_name(&doc, &record.logical_name)?;
        // Never replace a readable blob with one that is not
        decode(&bytes)?;
        self.store.put(&record.storage_key, &bytes)?;

        log::info!(
            "{} modified record {} ({}): {}",
            identity.username,
            record.id,
            mutation.kind(),
            change
        );
        Ok(ModifyOutcome {
            message: format!("File '{}' modified successfully. {}", record.logical_name, change),
            file: record.into(),
        })
    }

    /// Look up a record and check that `identity` owns it. Records owned
    /// by someone else are `Forbidden`, not `NotFound`.
    fn resolve(&self, identity: &Identity, id: i64, action: &str) -> Result<FileRecord, ServiceError> {
        let record = self
            .catalog
            .get_by_id(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("File {} not found.", id)))?;

        if record.owner != identity.username {
            log::warn!(
                "{} attempted to {} record {} owned by another user",
                identity.username,
                action,
                id
            );
            return Err(ServiceError::Forbidden(format!(
                "You do not have permission to {} this file.",
                action
            )));
        }
        Ok(record)
    }

    fn fetch_document(&self, record: &FileRecord) -> Result<TabularDocument, ServiceError> {
        let bytes = self.store.get(&record.storage_key)?;
        decode(&bytes).map_err(ServiceError::corrupt)
    }
}

/// Final path component of an uploaded file name (browsers on some
/// platforms send full client paths).
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::error::{ErrorKind, StoreError};
    use crate::object_store::MemoryStore;
    use cellvault_io::{encode, SpreadsheetFormat};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: FileService,
        alice: Identity,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        Fixture {
            service: FileService::new(store.clone(), catalog),
            store,
            alice: Identity::new("alice"),
        }
    }

    fn inventory_bytes(format: SpreadsheetFormat) -> Vec<u8> {
        let mut doc = TabularDocument::new(["item", "qty"]).unwrap();
        doc.push_row(vec!["bolt".into(), 5.0.into()]).unwrap();
        doc.push_row(vec!["nut".into(), 10.0.into()]).unwrap();
        doc.push_row(vec!["washer".into(), 7.0.into()]).unwrap();
        encode(&doc, format).unwrap()
    }

    /// Store that fails every call, for storage-down paths.
    struct DownStore;

    impl ObjectStore for DownStore {
        fn get(&self, _key: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Reads from memory and counts writes; writes fail when `accept_puts` is off.
    struct CountingStore {
        inner: MemoryStore,
        accept_puts: bool,
        puts: AtomicUsize,
    }

    impl CountingStore {
        fn seeded(key: &str, bytes: &[u8], accept_puts: bool) -> Self {
            let inner = MemoryStore::new();
            inner.put(key, bytes).unwrap();
            Self {
                inner,
                accept_puts,
                puts: AtomicUsize::new(0),
            }
        }
    }

    impl ObjectStore for CountingStore {
        fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            self.inner.get(key)
        }
        fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if !self.accept_puts {
                return Err(StoreError::Unavailable("write timed out".into()));
            }
            self.inner.put(key, bytes)
        }
    }

    fn counting_service(
        name: &str,
        bytes: &[u8],
        accept_puts: bool,
    ) -> (Arc<CountingStore>, FileService, i64) {
        let key = format!("alice/{name}");
        let store = Arc::new(CountingStore::seeded(&key, bytes, accept_puts));
        let catalog = Arc::new(MemoryCatalog::new());
        let record = catalog
            .create("alice", name, &key, SpreadsheetFormat::Xls.content_type())
            .unwrap();
        (store.clone(), FileService::new(store, catalog), record.id)
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("data.xlsx"), "data.xlsx");
        assert_eq!(base_name("C:\\Users\\a\\data.xls"), "data.xls");
        assert_eq!(base_name("/tmp/up/data.xlsx"), "data.xlsx");
        assert_eq!(base_name("dir/"), "");
    }

    #[test]
    fn test_upload_validation() {
        let f = fixture();
        let err = f.service.upload(&f.alice, "data.xlsx", None, &[]).unwrap_err();
        assert_eq!(err, ServiceError::InvalidRequest("No file provided.".into()));

        let err = f.service.upload(&f.alice, "notes.csv", None, b"a,b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedExtension);
        assert_eq!(err.to_string(), "Only XLS and XLSX files are allowed.");
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_upload_record_fields() {
        let f = fixture();
        let bytes = inventory_bytes(SpreadsheetFormat::Xlsx);
        let summary = f.service.upload(&f.alice, "reports/data.xlsx", None, &bytes).unwrap();

        assert_eq!(summary.file_name, "data.xlsx");
        assert_eq!(summary.storage_key, "alice/data.xlsx");
        assert_eq!(summary.owner_username, "alice");
        assert_eq!(summary.file_type, SpreadsheetFormat::Xlsx.content_type());
        assert_eq!(f.store.get("alice/data.xlsx").unwrap(), bytes);

        let json = serde_json::to_value(&summary).unwrap();
        for field in ["id", "file_name", "storage_key", "upload_date", "file_type", "owner_username"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn test_upload_keeps_explicit_content_type() {
        let f = fixture();
        let bytes = inventory_bytes(SpreadsheetFormat::Xls);
        let summary = f
            .service
            .upload(&f.alice, "old.xls", Some("application/octet-stream"), &bytes)
            .unwrap();
        assert_eq!(summary.file_type, "application/octet-stream");
    }

    #[test]
    fn test_reupload_replaces_blob_and_keeps_id() {
        let f = fixture();
        let first = f.service.upload(&f.alice, "data.xlsx", None, b"v1").unwrap();
        let second = f.service.upload(&f.alice, "data.xlsx", None, b"v2").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(f.service.list(&f.alice).unwrap().len(), 1);
        assert_eq!(f.service.download(&f.alice, first.id).unwrap().bytes, b"v2");
    }

    #[test]
    fn test_list_only_own_files() {
        let f = fixture();
        let bob = Identity::new("bob");
        f.service.upload(&f.alice, "a.xlsx", None, b"a").unwrap();
        f.service.upload(&bob, "b.xlsx", None, b"b").unwrap();
        f.service.upload(&f.alice, "c.xls", None, b"c").unwrap();

        let names: Vec<String> = f
            .service
            .list(&f.alice)
            .unwrap()
            .into_iter()
            .map(|s| s.file_name)
            .collect();
        assert_eq!(names, vec!["c.xls", "a.xlsx"]);
    }

    #[test]
    fn test_download_not_found_and_forbidden() {
        let f = fixture();
        let summary = f.service.upload(&f.alice, "a.xlsx", None, b"a").unwrap();

        let err = f.service.download(&f.alice, summary.id + 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f.service.download(&Identity::new("bob"), summary.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(err.to_string(), "You do not have permission to download this file.");
    }

    #[test]
    fn test_modify_update_cell_message() {
        let f = fixture();
        let summary = f
            .service
            .upload(&f.alice, "data.xlsx", None, &inventory_bytes(SpreadsheetFormat::Xlsx))
            .unwrap();

        let outcome = f
            .service
            .modify(&f.alice, summary.id, &MutationRequest::update_cell("qty", 1, json!(42)))
            .unwrap();
        assert_eq!(
            outcome.message,
            "File 'data.xlsx' modified successfully. Updated cell at row 1, column 'qty' to '42'."
        );
    }

    #[test]
    fn test_modify_rejects_before_fetch() {
        let f = fixture();
        let summary = f.service.upload(&f.alice, "data.xlsx", None, b"garbage").unwrap();

        // Request errors win over the corrupt blob: parsing happens first
        let bad = MutationRequest::default();
        let err = f.service.modify(&f.alice, summary.id, &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = f
            .service
            .modify(&f.alice, summary.id, &MutationRequest::delete_column("qty"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptSource);
        assert_eq!(f.store.get("alice/data.xlsx").unwrap(), b"garbage");
    }

    #[test]
    fn test_modify_document_errors_leave_blob() {
        let f = fixture();
        let bytes = inventory_bytes(SpreadsheetFormat::Xls);
        let summary = f.service.upload(&f.alice, "data.xls", None, &bytes).unwrap();

        let cases = [
            (MutationRequest::add_column("qty", json!(0)), ErrorKind::DuplicateColumn),
            (MutationRequest::update_cell("qty", 3, json!(1)), ErrorKind::OutOfRange),
            (MutationRequest::update_cell("qty", -1, json!(1)), ErrorKind::OutOfRange),
            (MutationRequest::delete_column("price"), ErrorKind::UnknownColumn),
        ];
        for (request, kind) in cases {
            let err = f.service.modify(&f.alice, summary.id, &request).unwrap_err();
            assert_eq!(err.kind(), kind, "{request:?}");
            assert_eq!(f.store.get("alice/data.xls").unwrap(), bytes);
        }
    }

    #[test]
    fn test_modify_keeps_legacy_container() {
        let f = fixture();
        let summary = f
            .service
            .upload(&f.alice, "data.xls", None, &inventory_bytes(SpreadsheetFormat::Xls))
            .unwrap();
        f.service
            .modify(&f.alice, summary.id, &MutationRequest::delete_column("item"))
            .unwrap();

        let stored = f.store.get("alice/data.xls").unwrap();
        assert_eq!(SpreadsheetFormat::sniff(&stored).unwrap(), SpreadsheetFormat::Xls);
        let doc = decode(&stored).unwrap();
        assert_eq!(doc.column_names(), &["qty".to_string()]);
    }

    #[test]
    fn test_inspect_limits_rows() {
        let f = fixture();
        let summary = f
            .service
            .upload(&f.alice, "data.xlsx", None, &inventory_bytes(SpreadsheetFormat::Xlsx))
            .unwrap();

        let preview = f.service.inspect(&f.alice, summary.id, 2).unwrap();
        assert_eq!(preview.columns, vec!["item", "qty"]);
        assert_eq!(preview.row_count, 3);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[1][1], CellValue::Number(10.0));
    }

    #[test]
    fn test_storage_down() {
        let catalog = Arc::new(MemoryCatalog::new());
        let record = catalog
            .create("alice", "data.xlsx", "alice/data.xlsx", "application/vnd.ms-excel")
            .unwrap();
        let service = FileService::new(Arc::new(DownStore), catalog);
        let alice = Identity::new("alice");

        let err = service.upload(&alice, "new.xlsx", None, b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        // Blob write failed, so no record was created
        assert_eq!(service.list(&alice).unwrap().len(), 1);

        let err = service.download(&alice, record.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);

        let err = service
            .modify(&alice, record.id, &MutationRequest::delete_column("qty"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn test_modify_failed_put_keeps_prior_blob() {
        let bytes = inventory_bytes(SpreadsheetFormat::Xls);
        let (store, service, id) = counting_service("data.xls", &bytes, false);

        let err = service
            .modify(&Identity::new("alice"), id, &MutationRequest::update_cell("qty", 0, json!(9)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("alice/data.xls").unwrap(), bytes);
    }

    #[test]
    fn test_modify_over_format_limit_never_writes() {
        // xls holds at most 256 columns
        let names: Vec<String> = (0..256).map(|i| format!("c{i}")).collect();
        let mut doc = TabularDocument::new(names).unwrap();
        doc.push_row(vec![CellValue::Number(1.0); 256]).unwrap();
        let bytes = encode(&doc, SpreadsheetFormat::Xls).unwrap();
        let (store, service, id) = counting_service("wide.xls", &bytes, true);

        let err = service
            .modify(&Identity::new("alice"), id, &MutationRequest::add_column("extra", json!(0)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("file format limits"));
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
        assert_eq!(store.get("alice/wide.xls").unwrap(), bytes);

        // The same store accepts edits that stay within the limit
        service
            .modify(&Identity::new("alice"), id, &MutationRequest::delete_column("c0"))
            .unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(decode(&store.get("alice/wide.xls").unwrap()).unwrap().column_count(), 255);
    }
}
