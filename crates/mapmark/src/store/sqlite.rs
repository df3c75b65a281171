//! `SQLite`-backed key-value store.
//!
//! A single `settings` table keyed by string, holding the flat marker
//! records. This is the durable backend the CLI and the app use; tests
//! mostly run against [`MemoryStore`](crate::store::MemoryStore) or an
//! in-memory database.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::kv::{KvError, KvStore};

/// SQL statement to create the settings table.
const CREATE_SETTINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL
)
";

/// A durable key-value store backed by `SQLite`.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a settings database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the table
    /// cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL keeps reads cheap while a save is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute(CREATE_SETTINGS_TABLE, [])?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute(CREATE_SETTINGS_TABLE, [])?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn key_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, KvError> {
        self.conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| KvError::read(key, e.to_string()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> std::result::Result<(), KvError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                (key, value),
            )
            .map_err(|e| KvError::write(key, e.to_string()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> std::result::Result<(), KvError> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", [key])
            .map_err(|e| KvError::write(key, e.to_string()))?;
        Ok(())
    }
}
