//! Saved login token.
//!
//! Reads/writes ~/.config/cellvault/auth.json (0600 on Unix). Written by
//! `cvault login`, removed by `cvault logout`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLogin {
    /// Bearer token issued by the identity provider
    pub token: String,
    /// Username (for display)
    #[serde(default)]
    pub username: Option<String>,
}

/// Returns the path to the auth file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("cellvault").join("auth.json"))
}

/// Load the saved login. None if nothing is saved or the file is unreadable.
pub fn load() -> Option<SavedLogin> {
    load_from(&auth_file_path()?)
}

pub fn load_from(path: &Path) -> Option<SavedLogin> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(login) => Some(login),
        Err(e) => {
            log::warn!("ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

pub fn save(login: &SavedLogin) -> Result<PathBuf, String> {
    let path = auth_file_path().ok_or("Could not determine config directory")?;
    save_to(&path, login)?;
    Ok(path)
}

/// Write the login, creating the parent directory. Sets 0600 on Unix.
pub fn save_to(path: &Path, login: &SavedLogin) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(login)
        .map_err(|e| format!("Failed to serialize token: {}", e))?;
    std::fs::write(path, contents).map_err(|e| format!("Failed to write auth file: {}", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    }

    Ok(())
}

pub fn delete() -> Result<(), String> {
    match auth_file_path() {
        Some(path) => delete_at(&path),
        None => Ok(()),
    }
}

pub fn delete_at(path: &Path) -> Result<(), String> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| format!("Failed to delete auth file: {}", e))?;
    }
    Ok(())
}
