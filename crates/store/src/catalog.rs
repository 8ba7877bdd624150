// File metadata catalog.
//
// One record per stored blob. `storage_key` is unique: registering the same
// key again refreshes the existing record instead of adding a second one.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub owner: String,
    pub logical_name: String,
    pub storage_key: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

pub trait Catalog: Send + Sync {
    fn create(
        &self,
        owner: &str,
        logical_name: &str,
        storage_key: &str,
        content_type: &str,
    ) -> Result<FileRecord, CatalogError>;

    /// Newest first; records created in the same instant are ordered by id, highest first.
    fn list_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, CatalogError>;

    fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>, CatalogError>;
}

// ============================================================================
// SQLite
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    logical_name TEXT NOT NULL,
    storage_key TEXT NOT NULL UNIQUE,
    content_type TEXT NOT NULL,
    created_at TEXT NOT NULL          -- RFC 3339, UTC, nanoseconds
);

CREATE INDEX IF NOT EXISTS files_owner ON files (owner, created_at);
"#;

const COLUMNS: &str = "id, owner, logical_name, storage_key, content_type, created_at";

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CatalogError::Database(format!("{}: {}", parent.display(), e)))?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(FileRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        logical_name: row.get(2)?,
        storage_key: row.get(3)?,
        content_type: row.get(4)?,
        created_at,
    })
}

impl Catalog for SqliteCatalog {
    fn create(
        &self,
        owner: &str,
        logical_name: &str,
        storage_key: &str,
        content_type: &str,
    ) -> Result<FileRecord, CatalogError> {
        let now = timestamp(&Utc::now());
        let conn = self.conn.lock();
        let record = conn.query_row(
            &format!(
                "INSERT INTO files (owner, logical_name, storage_key, content_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(storage_key) DO UPDATE SET
                     content_type = excluded.content_type,
                     created_at = excluded.created_at
                 RETURNING {}",
                COLUMNS
            ),
            params![owner, logical_name, storage_key, content_type, now],
            record_from_row,
        )?;
        log::debug!("catalog: record {} -> {}", record.id, record.storage_key);
        Ok(record)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, CatalogError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE owner = ?1 ORDER BY created_at DESC, id DESC",
            COLUMNS
        ))?;
        let records = stmt
            .query_map(params![owner], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>, CatalogError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", COLUMNS),
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    inner: Mutex<MemoryCatalogInner>,
}

#[derive(Default)]
struct MemoryCatalogInner {
    records: Vec<FileRecord>,
    next_id: i64,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for MemoryCatalog {
    fn create(
        &self,
        owner: &str,
        logical_name: &str,
        storage_key: &str,
        content_type: &str,
    ) -> Result<FileRecord, CatalogError> {
        let mut inner = self.inner.lock();
        let now = Utc::now();

        if let Some(existing) = inner.records.iter_mut().find(|r| r.storage_key == storage_key) {
            existing.content_type = content_type.to_string();
            existing.created_at = now;
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let record = FileRecord {
            id: inner.next_id,
            owner: owner.to_string(),
            logical_name: logical_name.to_string(),
            storage_key: storage_key.to_string(),
            content_type: content_type.to_string(),
            created_at: now,
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, CatalogError> {
        let inner = self.inner.lock();
        let mut records: Vec<FileRecord> = inner
            .records
            .iter()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>, CatalogError> {
        Ok(self.inner.lock().records.iter().find(|r| r.id == id).cloned())
    }
}
