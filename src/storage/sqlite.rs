use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use super::StorageBackend;
use crate::config::{DATABASE_FILE, DAYBOOK_DIR};
use crate::error::{DaybookError, Result};

/// A single-table SQLite file under `.daybook/`.
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Create `.daybook/` under `root` and an empty database in it
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(DAYBOOK_DIR);

        if dir.exists() {
            return Err(DaybookError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;
        Self::connect(dir.join(DATABASE_FILE))
    }

    /// Open the database of an initialized root
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(DAYBOOK_DIR).join(DATABASE_FILE);

        if !path.exists() {
            return Err(DaybookError::NotInitialized);
        }

        Self::connect(path)
    }

    fn connect(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the database file in bytes.
    pub fn file_size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

impl StorageBackend for SqliteBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
