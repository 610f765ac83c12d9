//! SQLite user accounts.

use super::User;
use crate::error::{RagChatError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        is_admin INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
"#;

const COLUMNS: &str = "id, email, password_hash, is_active, is_admin, created_at";

pub struct UserStore {
    conn: Mutex<Connection>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, bool, bool, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn to_user(raw: (String, String, String, bool, bool, String)) -> Result<User> {
    let (id, email, password_hash, is_active, is_admin, created_at) = raw;
    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| RagChatError::InvalidInput(format!("bad user id {}: {}", id, e)))?,
        email,
        password_hash,
        is_active,
        is_admin,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

impl UserStore {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!("Initialized user store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RagChatError::Auth(format!("Failed to acquire lock: {}", e)))
    }

    /// Insert a new account. Fails with `EmailTaken` if the email exists.
    pub fn create(&self, email: &str, password_hash: &str, is_active: bool) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_active,
            is_admin: false,
            created_at: Utc::now(),
        };

        let conn = self.lock()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO users (id, email, password_hash, is_active, is_admin, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.is_active,
                user.is_admin,
                user.created_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(RagChatError::EmailTaken);
        }
        Ok(user)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", COLUMNS),
                params![email],
                from_row,
            )
            .optional()?;
        raw.map(to_user).transpose()
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", COLUMNS),
                params![id.to_string()],
                from_row,
            )
            .optional()?;
        raw.map(to_user).transpose()
    }

    /// Update account flags. Returns whether the account exists.
    pub fn set_flags(&self, email: &str, is_active: bool, is_admin: bool) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE users SET is_active = ?2, is_admin = ?3 WHERE email = ?1",
            params![email, is_active, is_admin],
        )?;
        Ok(updated > 0)
    }

    pub fn list(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY created_at", COLUMNS))?;
        let rows = stmt
            .query_map([], from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(to_user).collect()
    }
}
