//! SQLite-backed key-value store.
//!
//! Three tables back the three value shapes: `kv` for strings, `hashes` for
//! field maps, `lists` for newest-first sequences. List order is kept with a
//! position column that decreases on every prepend, so index 0 is always the
//! most recently pushed value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{data_dir, KvStore};
use crate::error::StoreError;

/// SQLite store.
///
/// The connection is behind a mutex so the store can be shared between the
/// engine loop and the read-only reporting handlers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at `~/.config/nightwatch/nightwatch.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Self::open_at(dir.join("nightwatch.db"))
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path: PathBuf = path.as_ref().into();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for tests and ephemeral runs).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS hashes (
                key   TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, field)
            );

            CREATE TABLE IF NOT EXISTS lists (
                key   TEXT NOT NULL,
                pos   INTEGER NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, pos)
            );

            CREATE INDEX IF NOT EXISTS idx_lists_key_pos ON lists(key, pos);",
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-statement; nothing left to salvage.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM hashes WHERE key = ?1 AND field = ?2")?;
        let result = stmt.query_row(params![key, field], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT OR REPLACE INTO hashes (key, field, value) VALUES (?1, ?2, ?3)",
            params![key, field, value],
        )?;
        Ok(())
    }

    fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT field, value FROM hashes WHERE key = ?1")?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (field, value) = row?;
            map.insert(field, value);
        }
        Ok(map)
    }

    fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock();
        // New entries take a position below the current minimum, keeping
        // ascending position order equal to newest-first order.
        conn.execute(
            "INSERT INTO lists (key, pos, value)
             VALUES (?1, (SELECT COALESCE(MIN(pos), 1) - 1 FROM lists WHERE key = ?1), ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM lists WHERE key = ?1 ORDER BY pos ASC")?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn lindex(&self, key: &str, index: usize) -> Result<Option<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT value FROM lists WHERE key = ?1 ORDER BY pos ASC LIMIT 1 OFFSET ?2",
        )?;
        let result = stmt.query_row(params![key, index as i64], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn lset(&self, key: &str, index: usize, value: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "UPDATE lists SET value = ?3
             WHERE key = ?1
               AND pos = (SELECT pos FROM lists WHERE key = ?1
                          ORDER BY pos ASC LIMIT 1 OFFSET ?2)",
            params![key, index as i64, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.get("phase").unwrap().is_none());
        store.set("phase", "sleeping").unwrap();
        assert_eq!(store.get("phase").unwrap().unwrap(), "sleeping");
        store.set("phase", "waking").unwrap();
        assert_eq!(store.get("phase").unwrap().unwrap(), "waking");
    }

    #[test]
    fn hash_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.hget("userState", "a").unwrap().is_none());
        store.hset("userState", "a", "asleep").unwrap();
        store.hset("userState", "b", "awake").unwrap();
        store.hset("userState", "a", "awake").unwrap();

        let all = store.hgetall("userState").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], "awake");
        assert_eq!(all["b"], "awake");
    }

    #[test]
    fn list_is_newest_first() {
        let store = SqliteStore::open_memory().unwrap();
        store.lpush("h", "first").unwrap();
        store.lpush("h", "second").unwrap();
        store.lpush("h", "third").unwrap();

        assert_eq!(store.lrange("h").unwrap(), vec!["third", "second", "first"]);
        assert_eq!(store.lindex("h", 0).unwrap().unwrap(), "third");
        assert_eq!(store.lindex("h", 2).unwrap().unwrap(), "first");
        assert!(store.lindex("h", 3).unwrap().is_none());
    }

    #[test]
    fn lset_replaces_in_place() {
        let store = SqliteStore::open_memory().unwrap();
        store.lpush("h", "old").unwrap();
        store.lpush("h", "head").unwrap();
        store.lset("h", 0, "head2").unwrap();

        assert_eq!(store.lrange("h").unwrap(), vec!["head2", "old"]);
        // Past-the-end index is a no-op.
        store.lset("h", 5, "nope").unwrap();
        assert_eq!(store.lrange("h").unwrap(), vec!["head2", "old"]);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nightwatch.db");
        {
            let store = SqliteStore::open_at(&path).unwrap();
            store.set("phase", "waking").unwrap();
            store.lpush("h", "entry").unwrap();
        }
        let store = SqliteStore::open_at(&path).unwrap();
        assert_eq!(store.get("phase").unwrap().unwrap(), "waking");
        assert_eq!(store.lrange("h").unwrap(), vec!["entry"]);
    }
}
