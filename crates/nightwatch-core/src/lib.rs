//! # Nightwatch Core Library
//!
//! Core business logic for Nightwatch, a chat-driven coordinator for a
//! collective "everybody asleep / everybody awake" cycle across a small,
//! fixed roster of participants.
//!
//! ## Architecture
//!
//! - **Engine**: the global phase/state machine. Consumes reply and reminder
//!   events one at a time and routes them by the current phase
//! - **ReminderScheduler**: per-participant escalation chains backed by tokio
//!   timers, cancelled whenever the participant replies
//! - **History + Stats**: append-only sleep-session log per participant and
//!   the incremental statistics derived from each closed session
//! - **Store**: a thin key-value adapter (SQLite-backed) that is the single
//!   source of truth across restarts
//!
//! ## Key Components
//!
//! - [`Engine`]: phase-routed event handling and cycle completion
//! - [`ReminderScheduler`]: escalating reminder chains
//! - [`SleepHistory`] / [`StatsEngine`]: session log and aggregates
//! - [`KvStore`] / [`SqliteStore`]: persistence
//! - [`Config`]: roster and tunables, stored as TOML

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod notify;
pub mod phase;
pub mod reminder;
pub mod roster;
pub mod state;
pub mod stats;
pub mod store;

pub use config::Config;
pub use engine::Engine;
pub use error::{ConfigError, CoreError, Result, StoreError};
pub use events::{CycleComplete, EngineEvent, ReminderStage};
pub use history::{SleepHistory, SleepSession};
pub use notify::{LogNotifier, Notifier, WebhookNotifier};
pub use phase::{Phase, PhaseController};
pub use reminder::{EscalationDelays, ReminderScheduler};
pub use roster::{Participant, Roster};
pub use state::{UserState, UserStates};
pub use stats::{SleepStats, StatsConfig, StatsEngine};
pub use store::{KvStore, SqliteStore};
