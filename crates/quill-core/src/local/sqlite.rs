//! `SQLite`-backed key-value medium

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use super::medium::KeyValueMedium;
use super::migrations;
use crate::error::Result;

/// Durable medium storing each slot as one row of `kv_store`
pub struct SqliteMedium {
    conn: Mutex<Connection>,
}

impl SqliteMedium {
    /// Open the medium at the given path, creating parent directories and
    /// the database file if needed. Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory medium (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // WAL is unavailable for in-memory databases
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .ok();
        conn.execute_batch("PRAGMA synchronous = NORMAL;").ok();
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueMedium for SqliteMedium {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let medium = SqliteMedium::open_in_memory().unwrap();
        assert_eq!(medium.get_item("missing").unwrap(), None);
    }

    #[test]
    fn test_upsert_and_remove() {
        let medium = SqliteMedium::open_in_memory().unwrap();
        medium.set_item("local_notes", "[]").unwrap();
        medium.set_item("local_notes", "[1]").unwrap();
        assert_eq!(
            medium.get_item("local_notes").unwrap().as_deref(),
            Some("[1]")
        );

        medium.remove_item("local_notes").unwrap();
        assert_eq!(medium.get_item("local_notes").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("local.db");

        {
            let medium = SqliteMedium::open(&path).unwrap();
            medium.set_item("pending_sync_notes", "[\"x\"]").unwrap();
        }

        let reopened = SqliteMedium::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("pending_sync_notes").unwrap().as_deref(),
            Some("[\"x\"]")
        );
    }
}
