// Build the file service and identity provider from settings.

use std::path::PathBuf;
use std::sync::Arc;

use cellvault_config::{Settings, StorageBackend};
use cellvault_store::{
    FileService, FsStore, MemoryStore, ObjectStore, S3Config, S3Store, ServiceError,
    SqliteCatalog, SqliteIdentity,
};

pub struct Backends {
    pub service: FileService,
    pub identity: SqliteIdentity,
}

pub fn open(settings: &Settings) -> Result<Backends, ServiceError> {
    let store = object_store(settings)?;

    // Catalog and users share one database file
    let db = catalog_path(settings)?;
    let catalog = Arc::new(SqliteCatalog::open(&db)?);
    let identity = SqliteIdentity::open(&db)?;
    log::debug!("catalog at {}", db.display());

    Ok(Backends {
        service: FileService::new(store, catalog),
        identity,
    })
}

/// Identity only; for commands that never touch blobs.
pub fn open_identity(settings: &Settings) -> Result<SqliteIdentity, ServiceError> {
    Ok(SqliteIdentity::open(&catalog_path(settings)?)?)
}

fn catalog_path(settings: &Settings) -> Result<PathBuf, ServiceError> {
    settings
        .catalog
        .path
        .clone()
        .ok_or_else(|| ServiceError::Internal("catalog.path is not set".into()))
}

fn object_store(settings: &Settings) -> Result<Arc<dyn ObjectStore>, ServiceError> {
    let storage = &settings.storage;
    match storage.backend {
        StorageBackend::Fs => {
            let root = storage.root.clone().ok_or_else(|| {
                ServiceError::Internal("storage.root is required for the fs backend".into())
            })?;
            log::debug!("fs store at {}", root.display());
            Ok(Arc::new(FsStore::new(root)))
        }
        StorageBackend::S3 => {
            let s3 = &storage.s3;
            let config = S3Config {
                endpoint: s3.endpoint.clone(),
                bucket: s3.bucket.clone(),
                region: s3.region.clone(),
                access_key: s3.access_key.clone().unwrap_or_default(),
                secret_key: s3.secret_key.clone().unwrap_or_default(),
                path_style: s3.path_style,
            };
            log::debug!("s3 store {} bucket {}", s3.endpoint, s3.bucket);
            Ok(Arc::new(S3Store::new(config)?))
        }
        StorageBackend::Memory => {
            log::warn!("memory storage backend: blobs are discarded when cvault exits");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
