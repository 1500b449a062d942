//! The global phase/state machine.
//!
//! The engine consumes [`EngineEvent`]s one at a time and routes them by the
//! current phase: a qualifying reply during the sleeping phase resets that
//! participant's escalation chain, while during the waking phase it closes
//! the open session, folds it into the statistics, and marks the participant
//! awake. After every transition the all-participants predicate is
//! evaluated; when it holds, the phase toggles and a [`CycleComplete`] is
//! returned for the supervising loop to act on. The engine never terminates
//! the host process.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::events::{CycleComplete, EngineEvent, ReminderStage};
use crate::history::SleepHistory;
use crate::notify::Notifier;
use crate::phase::{Phase, PhaseController};
use crate::reminder::ReminderScheduler;
use crate::roster::Roster;
use crate::state::{UserState, UserStates};
use crate::stats::{SleepStats, StatsConfig, StatsEngine};
use crate::store::KvStore;

const ACK_STILL_AWAKE: &str = "Still awake? I'll check again later.";
const ACK_GOOD_MORNING: &str = "Good morning! You're marked awake.";
const PROMPT_FIRST: &str = "Are you still awake?";
const PROMPT_SECOND: &str = "Are you really asleep?";

fn greeting(name: &str, token: &str) -> String {
    format!("Hello {name}! Reply \"{token}\" if you're awake.")
}

fn final_notice(token: &str) -> String {
    format!("Marking you as asleep. Reply '{token}' when you wake up.")
}

fn stats_message(stats: &SleepStats) -> String {
    format!(
        "Sleep Statistics:\n\
         Sleep Debt: {:.1} hours\n\
         Good Sleep Streak: {} days\n\
         Best Streak: {} days\n\
         Good Night Percentage: {:.1}%",
        stats.sleep_debt_hours,
        stats.good_sleep_streak,
        stats.best_streak,
        stats.good_night_percentage(),
    )
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Phase-routed event handling over the shared store.
pub struct Engine {
    roster: Roster,
    affirmative: String,
    phase: PhaseController,
    states: UserStates,
    history: SleepHistory,
    stats: StatsEngine,
    scheduler: ReminderScheduler,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn KvStore>,
        roster: Roster,
        affirmative: impl Into<String>,
        stats_config: StatsConfig,
        scheduler: ReminderScheduler,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            roster,
            affirmative: affirmative.into(),
            phase: PhaseController::new(store.clone()),
            states: UserStates::new(store.clone()),
            history: SleepHistory::new(store.clone()),
            stats: StatsEngine::new(store, stats_config),
            scheduler,
            notifier,
        }
    }

    pub fn current_phase(&self) -> Result<Phase> {
        self.phase.current()
    }

    /// Act on the current phase at cycle start. Entering the sleeping phase
    /// announces to every roster participant and arms their chains; the
    /// waking phase is silent, waiting for replies.
    pub fn start_cycle(&mut self) -> Result<()> {
        match self.phase.current()? {
            Phase::Sleeping => {
                info!("sleeping phase: announcing to {} participants", self.roster.len());
                let participants: Vec<(String, String)> = self
                    .roster
                    .iter()
                    .map(|p| (p.id.clone(), p.name.clone()))
                    .collect();
                for (id, name) in participants {
                    self.notifier.send(&id, &greeting(&name, &self.affirmative));
                    self.scheduler.start(&id);
                }
            }
            Phase::Waking => {
                info!("waking phase: waiting for wake-up confirmations");
            }
        }
        Ok(())
    }

    /// Process one event. Returns a [`CycleComplete`] when it flipped the
    /// global phase.
    pub fn handle(&mut self, event: EngineEvent) -> Result<Option<CycleComplete>> {
        match event {
            EngineEvent::Reply {
                participant_id,
                text,
            } => self.handle_reply(&participant_id, &text),
            EngineEvent::ReminderDue {
                participant_id,
                stage,
                epoch,
            } => self.handle_reminder(&participant_id, stage, epoch),
        }
    }

    fn is_affirmative(&self, text: &str) -> bool {
        text.trim().eq_ignore_ascii_case(&self.affirmative)
    }

    fn handle_reply(&mut self, participant_id: &str, text: &str) -> Result<Option<CycleComplete>> {
        if !self.roster.contains(participant_id) {
            debug!("ignoring reply from unknown participant {participant_id}");
            return Ok(None);
        }
        if !self.is_affirmative(text) {
            debug!("ignoring non-qualifying reply from {participant_id}");
            return Ok(None);
        }

        match self.phase.current()? {
            Phase::Sleeping => {
                // Cancel the pending escalation before any further
                // scheduling decision, then re-arm from the top.
                self.scheduler.start(participant_id);
                self.notifier.send(participant_id, ACK_STILL_AWAKE);
                Ok(None)
            }
            Phase::Waking => {
                self.mark_awake(participant_id)?;
                self.notifier.send(participant_id, ACK_GOOD_MORNING);
                self.try_complete(Phase::Waking)
            }
        }
    }

    fn handle_reminder(
        &mut self,
        participant_id: &str,
        stage: ReminderStage,
        epoch: u64,
    ) -> Result<Option<CycleComplete>> {
        if !self.scheduler.is_current(participant_id, epoch) {
            // The chain was cancelled or superseded after this stage was
            // queued. Firing late must be a no-op.
            debug!("ignoring stale reminder for {participant_id}");
            return Ok(None);
        }
        match stage {
            ReminderStage::First => {
                self.notifier.send(participant_id, PROMPT_FIRST);
                Ok(None)
            }
            ReminderStage::Second => {
                self.notifier.send(participant_id, PROMPT_SECOND);
                Ok(None)
            }
            ReminderStage::Final => {
                self.scheduler.cancel(participant_id);
                self.notifier
                    .send(participant_id, &final_notice(&self.affirmative));
                self.mark_asleep(participant_id)?;
                self.try_complete(Phase::Sleeping)
            }
        }
    }

    /// Open a session and record the participant asleep. Redundant when
    /// already asleep, preserving the single-open-session invariant.
    fn mark_asleep(&mut self, participant_id: &str) -> Result<()> {
        if self.states.get(participant_id)? == Some(UserState::Asleep) {
            debug!("{participant_id} already asleep");
            return Ok(());
        }
        self.history.open_session(participant_id, now_ms())?;
        self.states.set(participant_id, UserState::Asleep)
    }

    /// Close the open session (if any), fold it into the statistics, and
    /// record the participant awake. A wake with no matching open session is
    /// tolerated; a malformed newest entry is reported and skipped.
    fn mark_awake(&mut self, participant_id: &str) -> Result<()> {
        let closed = match self.history.close_latest(participant_id, now_ms()) {
            Ok(closed) => closed,
            Err(e @ CoreError::MalformedRecord { .. }) => {
                warn!("wake for {participant_id}: {e}");
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(session) = closed {
            let stats = self.stats.record_night(participant_id, &session)?;
            self.notifier.send(participant_id, &stats_message(&stats));
        }
        self.states.set(participant_id, UserState::Awake)
    }

    /// Toggle the phase when every roster participant reached the current
    /// phase's target state.
    fn try_complete(&mut self, current: Phase) -> Result<Option<CycleComplete>> {
        if !self
            .phase
            .all_in(current.target_state(), &self.roster)?
        {
            return Ok(None);
        }
        let next = self.phase.toggle()?;
        self.scheduler.cancel_all();
        info!("cycle complete: phase is now {}", next.as_str());
        Ok(Some(CycleComplete {
            phase: next,
            at: Utc::now(),
        }))
    }
}
