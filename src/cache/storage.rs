//! SQLite-backed single-entry photo store
//!
//! The entry lives under one well-known key, so replacing it is a single
//! `INSERT OR REPLACE` and two entries can never coexist.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CacheEntry, CacheStore};
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Key the committed photo is stored under
const PHOTO_CACHE_KEY: &str = "photo_cache";

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed store for the committed photo
pub struct CacheStorage {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl CacheStorage {
    /// Get the cache directory path (~/.cache/backdrop on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("backdrop"))
    }

    /// Resolve an optional override into a concrete cache directory
    pub fn resolve_dir(dir: Option<&str>) -> Result<PathBuf> {
        match dir {
            Some(d) => Ok(PathBuf::from(d)),
            None => Self::cache_dir(),
        }
    }

    /// Open storage in a specific directory
    ///
    /// A database file SQLite cannot use is dropped and recreated empty.
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let conn = match Self::connect(&db_path) {
            Ok(conn) => conn,
            Err(CacheError::Sqlite(e)) => {
                log::warn!("Cache database unusable ({}), rebuilding", e);
                Self::nuke(&db_path)?;
                Self::connect(&db_path)?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn connect(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn.pragma_query_value(None, "user_version", |r| r.get(0))?;

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(db_path)?;
            return Self::connect(db_path);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(conn)
    }

    /// Path of the SQLite database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Raw stored record, parsed or not
    fn read_raw(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [PHOTO_CACHE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove the stored entry
    pub fn clear(&self) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM kv_store WHERE key = ?1", [PHOTO_CACHE_KEY])?;
        Ok(deleted > 0)
    }

    /// Describe what is stored, without interpreting it for refresh purposes
    pub fn stats(&self) -> Result<CacheStats> {
        let raw = self.read_raw()?;
        let size_bytes = raw.as_ref().map(|r| r.len()).unwrap_or(0);
        let entry = raw.as_deref().and_then(|r| serde_json::from_str(r).ok());
        let corrupt = raw.is_some() && entry.is_none();

        Ok(CacheStats {
            entry,
            corrupt,
            size_bytes,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Io("Cache connection lock poisoned".to_string()))
    }

    /// Nuke the cache database
    fn nuke(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        Ok(())
    }
}

impl CacheStore for CacheStorage {
    fn read(&self) -> Option<CacheEntry> {
        let raw = match self.read_raw() {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Failed to read photo cache: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Ignoring unreadable photo cache record: {}", e);
                None
            }
        }
    }

    fn write(&self, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![PHOTO_CACHE_KEY, json, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

/// Statistics about cache state
#[derive(Debug)]
pub struct CacheStats {
    /// The parsed entry, if one is stored and readable
    pub entry: Option<CacheEntry>,
    /// A record exists but could not be parsed
    pub corrupt: bool,
    pub size_bytes: usize,
}
