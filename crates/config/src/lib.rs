// Configuration loading

pub mod settings;

pub use settings::{
    CatalogSettings, ConfigError, LogSettings, S3Settings, Settings, StorageBackend,
    StorageSettings,
};
