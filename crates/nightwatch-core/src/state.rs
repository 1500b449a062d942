//! Per-participant current state.
//!
//! States live in the `userState` hash, one field per participant id. An
//! entry appears only after the participant's first transition, so absence
//! is observably distinct from either value.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::KvStore;

/// Store hash holding participant states.
pub const USER_STATE_KEY: &str = "userState";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    Asleep,
    Awake,
}

impl UserState {
    pub fn as_str(self) -> &'static str {
        match self {
            UserState::Asleep => "asleep",
            UserState::Awake => "awake",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asleep" => Some(UserState::Asleep),
            "awake" => Some(UserState::Awake),
            _ => None,
        }
    }
}

/// Persisted per-participant state map.
#[derive(Clone)]
pub struct UserStates {
    store: Arc<dyn KvStore>,
}

impl UserStates {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Recorded state for a participant, None before the first transition.
    pub fn get(&self, participant_id: &str) -> Result<Option<UserState>> {
        let raw = self.store.hget(USER_STATE_KEY, participant_id)?;
        Ok(raw.as_deref().and_then(UserState::parse))
    }

    pub fn set(&self, participant_id: &str, state: UserState) -> Result<()> {
        self.store
            .hset(USER_STATE_KEY, participant_id, state.as_str())?;
        Ok(())
    }

    /// Raw state map as persisted (for the status endpoint).
    pub fn all_raw(&self) -> Result<HashMap<String, String>> {
        Ok(self.store.hgetall(USER_STATE_KEY)?)
    }
}
