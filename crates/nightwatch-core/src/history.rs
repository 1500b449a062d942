//! Per-participant append-only sleep-session log.
//!
//! Sessions are stored newest-first under `sleepHistory:<id>` as JSON
//! records. The log is append-only except for the single in-place update
//! that closes the most recent open session.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::store::KvStore;

/// One sleep session. `end` is absent while the session is open; at most one
/// open session may exist per participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSession {
    /// Epoch milliseconds.
    pub start: i64,
    /// Epoch milliseconds, None while the session is open.
    pub end: Option<i64>,
}

impl SleepSession {
    pub fn open_at(start: i64) -> Self {
        Self { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Duration in hours; None while open.
    pub fn hours(&self) -> Option<f64> {
        self.end
            .map(|end| (end - self.start) as f64 / (1000.0 * 60.0 * 60.0))
    }

    /// Start instant in the local timezone, for the wall-clock hour rule.
    pub fn start_local(&self) -> DateTime<Local> {
        Local
            .timestamp_millis_opt(self.start)
            .single()
            .unwrap_or_else(|| Local.timestamp_millis_opt(0).unwrap())
    }

    /// Start instant in UTC.
    pub fn start_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.start)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
    }
}

fn history_key(participant_id: &str) -> String {
    format!("sleepHistory:{participant_id}")
}

fn decode(key: &str, raw: &str) -> Result<SleepSession> {
    serde_json::from_str(raw).map_err(|_| CoreError::MalformedRecord {
        key: key.to_string(),
        raw: raw.to_string(),
    })
}

/// Append-only session log over the key-value store.
#[derive(Clone)]
pub struct SleepHistory {
    store: Arc<dyn KvStore>,
}

impl SleepHistory {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Prepend a new open session starting at `start_ms`.
    pub fn open_session(&self, participant_id: &str, start_ms: i64) -> Result<()> {
        let session = SleepSession::open_at(start_ms);
        let raw = serde_json::to_string(&session)?;
        self.store.lpush(&history_key(participant_id), &raw)?;
        Ok(())
    }

    /// Close the most recent session in place, setting `end = end_ms`.
    ///
    /// Returns the closed session, or None when the log is empty or the
    /// newest entry is already closed. A newest entry that fails validating
    /// decode yields [`CoreError::MalformedRecord`] and leaves the log
    /// unchanged.
    pub fn close_latest(&self, participant_id: &str, end_ms: i64) -> Result<Option<SleepSession>> {
        let key = history_key(participant_id);
        let Some(raw) = self.store.lindex(&key, 0)? else {
            return Ok(None);
        };
        let mut session = decode(&key, &raw)?;
        if !session.is_open() {
            return Ok(None);
        }
        session.end = Some(end_ms);
        let updated = serde_json::to_string(&session)?;
        self.store.lset(&key, 0, &updated)?;
        Ok(Some(session))
    }

    /// A participant's full history, newest first. Entries that fail
    /// validating decode are reported and skipped rather than failing the
    /// whole read.
    pub fn sessions(&self, participant_id: &str) -> Result<Vec<SleepSession>> {
        let key = history_key(participant_id);
        let mut sessions = Vec::new();
        for raw in self.store.lrange(&key)? {
            match decode(&key, &raw) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!("skipping malformed history entry: {e}"),
            }
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn history() -> (SleepHistory, Arc<dyn KvStore>) {
        let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open_memory().unwrap());
        (SleepHistory::new(store.clone()), store)
    }

    #[test]
    fn open_then_close_sets_end_in_place() {
        let (history, _) = history();
        history.open_session("a", 1000).unwrap();
        let closed = history.close_latest("a", 1000 + 9 * HOUR_MS).unwrap().unwrap();
        assert_eq!(closed.start, 1000);
        assert_eq!(closed.end, Some(1000 + 9 * HOUR_MS));
        assert!((closed.hours().unwrap() - 9.0).abs() < 1e-9);

        let sessions = history.sessions("a").unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].is_open());
    }

    #[test]
    fn newest_first_ordering() {
        let (history, _) = history();
        history.open_session("a", 1).unwrap();
        history.close_latest("a", 2).unwrap();
        history.open_session("a", 10).unwrap();

        let sessions = history.sessions("a").unwrap();
        assert_eq!(sessions[0].start, 10);
        assert!(sessions[0].is_open());
        assert_eq!(sessions[1].start, 1);
    }

    #[test]
    fn close_without_open_session_is_none() {
        let (history, _) = history();
        assert!(history.close_latest("a", 5).unwrap().is_none());

        history.open_session("a", 1).unwrap();
        history.close_latest("a", 2).unwrap();
        // Newest entry already closed.
        assert!(history.close_latest("a", 3).unwrap().is_none());
    }

    #[test]
    fn malformed_head_is_reported_and_untouched() {
        let (history, store) = history();
        store.lpush("sleepHistory:a", "{not json").unwrap();

        let err = history.close_latest("a", 5).unwrap_err();
        assert!(matches!(err, CoreError::MalformedRecord { .. }));
        // The entry is left as-is.
        assert_eq!(store.lindex("sleepHistory:a", 0).unwrap().unwrap(), "{not json");
        // Bulk reads skip it.
        assert!(history.sessions("a").unwrap().is_empty());
    }
}
