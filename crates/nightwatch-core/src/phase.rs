//! Global cycle phase and the all-participants transition rule.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::roster::Roster;
use crate::state::{UserState, USER_STATE_KEY};
use crate::store::KvStore;

/// Store key holding the singleton phase value.
pub const PHASE_KEY: &str = "sleepPhase";

/// Global cycle state. Exactly one value, persisted, defaults to `Sleeping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Sleeping,
    Waking,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Sleeping => "sleeping",
            Phase::Waking => "waking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sleeping" => Some(Phase::Sleeping),
            "waking" => Some(Phase::Waking),
            _ => None,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Phase::Sleeping => Phase::Waking,
            Phase::Waking => Phase::Sleeping,
        }
    }

    /// The per-participant state that completes this phase.
    pub fn target_state(self) -> UserState {
        match self {
            Phase::Sleeping => UserState::Asleep,
            Phase::Waking => UserState::Awake,
        }
    }
}

/// Owns the persisted phase value and the transition predicate.
#[derive(Clone)]
pub struct PhaseController {
    store: Arc<dyn KvStore>,
}

impl PhaseController {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Current phase; `Sleeping` when unset. An unrecognized persisted value
    /// is reported and treated as the default rather than corrupting a run.
    pub fn current(&self) -> Result<Phase> {
        match self.store.get(PHASE_KEY)? {
            None => Ok(Phase::Sleeping),
            Some(raw) => match Phase::parse(&raw) {
                Some(phase) => Ok(phase),
                None => {
                    warn!("unrecognized phase value '{raw}', defaulting to sleeping");
                    Ok(Phase::Sleeping)
                }
            },
        }
    }

    /// Flip and persist the phase. Returns the new value; callers are
    /// responsible for acting on it.
    pub fn toggle(&self) -> Result<Phase> {
        let next = self.current()?.flipped();
        self.store.set(PHASE_KEY, next.as_str())?;
        Ok(next)
    }

    /// True iff every roster participant has a recorded state equal to
    /// `target`. A participant with no recorded state fails the predicate,
    /// and the empty roster yields false; the roster, not the store, is the
    /// source of required participants.
    pub fn all_in(&self, target: UserState, roster: &Roster) -> Result<bool> {
        if roster.is_empty() {
            return Ok(false);
        }
        let states = self.store.hgetall(USER_STATE_KEY)?;
        Ok(roster
            .iter()
            .all(|p| states.get(&p.id).map(String::as_str) == Some(target.as_str())))
    }
}
