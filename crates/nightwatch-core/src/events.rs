//! Engine events.
//!
//! Inbound replies and timer expirations are the only sources of state
//! transitions. Both arrive as [`EngineEvent`]s on a single channel and are
//! processed one at a time; a completed cycle surfaces as [`CycleComplete`]
//! for the supervising loop to act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Stage of the escalation chain, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStage {
    First,
    Second,
    Final,
}

/// An input consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// An inbound chat message from a participant.
    Reply {
        participant_id: String,
        text: String,
    },
    /// A stage of a participant's escalation chain came due. `epoch`
    /// identifies the chain that armed it; a stale epoch is a no-op.
    ReminderDue {
        participant_id: String,
        stage: ReminderStage,
        epoch: u64,
    },
}

/// Emitted when every roster participant reaches the phase's target state
/// and the phase toggles. The core never ends the host process; a
/// supervisor consumes this and re-arms or winds down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleComplete {
    /// The phase just entered.
    pub phase: Phase,
    pub at: DateTime<Utc>,
}
