// Workspace settings
// Loaded from ~/.config/cellvault/config.toml, then CELLVAULT_* environment overrides

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where blobs are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One file per key under `storage.root` (default)
    #[default]
    Fs,
    /// S3-compatible endpoint (MinIO, AWS)
    S3,
    /// In-process only; lost on exit
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" | "file" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "minio" => Ok(StorageBackend::S3),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Invalid(format!(
                "unknown storage backend '{}' (expected fs, s3, or memory)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// `{endpoint}/{bucket}/{key}` addressing; MinIO needs this
    pub path_style: bool,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "cellvault-files".to_string(),
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            path_style: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root directory for the fs backend
    pub root: Option<PathBuf>,
    pub s3: S3Settings,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: data_dir().map(|d| d.join("blobs")),
            s3: S3Settings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// SQLite database holding file records and users
    pub path: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: data_dir().map(|d| d.join("cellvault.db")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// error, warn, info, debug, or trace
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "warn".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub catalog: CatalogSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Config file exists but could not be read
    Read(PathBuf, String),
    /// Config file is not valid TOML for these settings
    Parse(PathBuf, String),
    /// Settings are inconsistent (missing credentials, unknown values)
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, msg) => write!(f, "cannot read {}: {}", path.display(), msg),
            ConfigError::Parse(path, msg) => write!(f, "invalid config {}: {}", path.display(), msg),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("cellvault"))
}

impl Settings {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellvault")
            .join("config.toml")
    }

    /// Load from the default path, apply environment overrides, validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_file(&Self::config_path())
    }

    /// Same as `load`, for an explicit config file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Self::load_from(path)?;
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse(_, msg) => ConfigError::Parse(path.to_path_buf(), msg),
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Overlay `CELLVAULT_*` variables. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CELLVAULT_STORAGE_BACKEND") {
            self.storage.backend = v.parse()?;
        }
        if let Some(v) = get("CELLVAULT_STORAGE_ROOT") {
            self.storage.root = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CELLVAULT_S3_ENDPOINT") {
            self.storage.s3.endpoint = v;
        }
        if let Some(v) = get("CELLVAULT_S3_BUCKET") {
            self.storage.s3.bucket = v;
        }
        if let Some(v) = get("CELLVAULT_S3_REGION") {
            self.storage.s3.region = v;
        }
        if let Some(v) = get("CELLVAULT_S3_ACCESS_KEY") {
            self.storage.s3.access_key = Some(v);
        }
        if let Some(v) = get("CELLVAULT_S3_SECRET_KEY") {
            self.storage.s3.secret_key = Some(v);
        }
        if let Some(v) = get("CELLVAULT_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CELLVAULT_LOG") {
            self.log.level = v;
        }
        Ok(())
    }

    /// Check that the selected backend has what it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend {
            StorageBackend::Fs => {
                if self.storage.root.is_none() {
                    return Err(ConfigError::Invalid(
                        "storage.root is required for the fs backend".into(),
                    ));
                }
            }
            StorageBackend::S3 => {
                let s3 = &self.storage.s3;
                if s3.endpoint.trim().is_empty() {
                    return Err(ConfigError::Invalid("storage.s3.endpoint is empty".into()));
                }
                if s3.bucket.trim().is_empty() {
                    return Err(ConfigError::Invalid("storage.s3.bucket is empty".into()));
                }
                let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.is_empty());
                if missing(&s3.access_key) || missing(&s3.secret_key) {
                    return Err(ConfigError::Invalid(
                        "storage.s3.access_key and storage.s3.secret_key are required for the s3 backend"
                            .into(),
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        if self.catalog.path.is_none() {
            return Err(ConfigError::Invalid("catalog.path is not set".into()));
        }

        if self.log_filter().is_none() {
            return Err(ConfigError::Invalid(format!(
                "log.level '{}' (expected error, warn, info, debug, trace, or off)",
                self.log.level
            )));
        }
        Ok(())
    }

    /// Normalized log level, or None if unrecognized
    pub fn log_filter(&self) -> Option<&'static str> {
        match self.log.level.trim().to_ascii_lowercase().as_str() {
            "off" => Some("off"),
            "error" => Some("error"),
            "warn" | "warning" => Some("warn"),
            "info" => Some("info"),
            "debug" => Some("debug"),
            "trace" => Some("trace"),
            _ => None,
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Read(parent.to_path_buf(), e.to_string()))?;
        }
        let contents = self.to_toml()?;
        fs::write(path, contents).map_err(|e| ConfigError::Read(path.to_path_buf(), e.to_string()))
    }
}
