//! Persistent key-value store adapter.
//!
//! The store is the single source of truth across restarts. It offers three
//! shapes: plain strings, hashes (field -> string), and lists (newest-first,
//! prepend-ordered). Multi-step read-modify-write sequences are not
//! transactional; callers accept the resulting race window.

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::StoreError;

/// Key-value store with string, hash, and list capabilities.
///
/// List semantics are newest-first: `lpush` prepends, index 0 is the most
/// recent entry, and `lset` replaces in place at an index.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Prepend a value; it becomes index 0.
    fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// All values, newest first.
    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError>;
    /// Value at `index` (0 = newest), or None past the end.
    fn lindex(&self, key: &str, index: usize) -> Result<Option<String>, StoreError>;
    /// Replace the value at `index` in place. No-op past the end.
    fn lset(&self, key: &str, index: usize, value: &str) -> Result<(), StoreError>;
}

/// Returns `~/.config/nightwatch[-dev]/` based on NIGHTWATCH_ENV.
///
/// Set NIGHTWATCH_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("NIGHTWATCH_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("nightwatch-dev")
    } else {
        base_dir.join("nightwatch")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
