// Users and bearer tokens.
//
// A user holds at most one token at a time: logging in again hands back
// the same token until it is revoked by logout.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::Sha256;

use crate::error::IdentityError;

type HmacSha256 = Hmac<Sha256>;

/// Authenticated caller. Handlers only ever look at `username`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Identity, IdentityError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL DEFAULT '',
    salt TEXT NOT NULL,
    password_hash BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tokens (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteIdentity {
    conn: Mutex<Connection>,
}

impl SqliteIdentity {
    pub fn open(path: &Path) -> Result<Self, IdentityError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| IdentityError::Database(format!("{}: {}", parent.display(), e)))?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, IdentityError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, IdentityError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<Identity, IdentityError> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(IdentityError::Invalid("Password must not be empty.".into()));
        }

        let salt = uuid::Uuid::new_v4().simple().to_string();
        let hash = password_hash(&salt, password)?;

        let conn = self.conn.lock();
        let taken: Option<i64> = conn
            .query_row("SELECT id FROM users WHERE username = ?1", params![username], |row| row.get(0))
            .optional()?;
        if taken.is_some() {
            return Err(IdentityError::UsernameTaken(username.to_string()));
        }

        conn.execute(
            "INSERT INTO users (username, email, salt, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, email.trim(), salt, hash, now()],
        )?;
        log::info!("registered user '{}'", username);
        Ok(Identity::new(username))
    }

    /// Check credentials and return the user's token, issuing one if needed.
    pub fn login(&self, username: &str, password: &str) -> Result<String, IdentityError> {
        let conn = self.conn.lock();
        let user: Option<(i64, String, Vec<u8>)> = conn
            .query_row(
                "SELECT id, salt, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (user_id, salt, stored) = user.ok_or(IdentityError::InvalidCredentials)?;

        password_mac(&salt, password)?
            .verify_slice(&stored)
            .map_err(|_| IdentityError::InvalidCredentials)?;

        let existing: Option<String> = conn
            .query_row("SELECT token FROM tokens WHERE user_id = ?1", params![user_id], |row| row.get(0))
            .optional()?;
        if let Some(token) = existing {
            return Ok(token);
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        conn.execute(
            "INSERT INTO tokens (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, now()],
        )?;
        log::info!("issued token for '{}'", username);
        Ok(token)
    }

    /// Revoke a token. Best effort: failures are logged, never returned.
    pub fn logout(&self, token: &str) {
        let conn = self.conn.lock();
        match conn.execute("DELETE FROM tokens WHERE token = ?1", params![token]) {
            Ok(0) => log::debug!("logout: token was not active"),
            Ok(_) => log::info!("token revoked"),
            Err(e) => log::warn!("logout: could not revoke token: {}", e),
        }
    }
}

impl IdentityProvider for SqliteIdentity {
    fn authenticate(&self, token: &str) -> Result<Identity, IdentityError> {
        let conn = self.conn.lock();
        let username: Option<String> = conn
            .query_row(
                "SELECT u.username FROM tokens t JOIN users u ON u.id = t.user_id WHERE t.token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;
        username.map(Identity::new).ok_or(IdentityError::InvalidToken)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn password_mac(salt: &str, password: &str) -> Result<HmacSha256, IdentityError> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
        .map_err(|e| IdentityError::Database(e.to_string()))?;
    mac.update(password.as_bytes());
    Ok(mac)
}

fn password_hash(salt: &str, password: &str) -> Result<Vec<u8>, IdentityError> {
    Ok(password_mac(salt, password)?.finalize().into_bytes().to_vec())
}

/// Usernames prefix storage keys, so they are limited to letters, digits
/// and `@ . + - _`, and may not be `.` or `..`.
fn validate_username(username: &str) -> Result<(), IdentityError> {
    if username.is_empty() || username.len() > 150 {
        return Err(IdentityError::Invalid(
            "Username must be between 1 and 150 characters.".into(),
        ));
    }
    let allowed = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !allowed || username == "." || username == ".." {
        return Err(IdentityError::Invalid(
            "Username may contain only letters, digits and @/./+/-/_ characters.".into(),
        ));
    }
    Ok(())
}
