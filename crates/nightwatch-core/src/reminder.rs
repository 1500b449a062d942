//! Per-participant escalation chains.
//!
//! Each participant has at most one active chain: a single tokio task that
//! sleeps through the three configured delays and emits a `ReminderDue`
//! event after each. Restarting a chain supersedes the previous one, and
//! cancelling aborts the task. Events carry the chain's epoch so a stage
//! that was already queued when its chain died is recognizably stale.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::events::{EngineEvent, ReminderStage};

/// The three escalation delays. Tunable configuration, not constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDelays {
    pub first: Duration,
    pub second: Duration,
    pub final_notice: Duration,
}

impl EscalationDelays {
    pub fn from_minutes(first: u64, second: u64, final_notice: u64) -> Self {
        Self {
            first: Duration::from_secs(first * 60),
            second: Duration::from_secs(second * 60),
            final_notice: Duration::from_secs(final_notice * 60),
        }
    }

    fn stages(self) -> [(ReminderStage, Duration); 3] {
        [
            (ReminderStage::First, self.first),
            (ReminderStage::Second, self.second),
            (ReminderStage::Final, self.final_notice),
        ]
    }
}

impl Default for EscalationDelays {
    /// The production intervals: 15, then 10, then 5 minutes.
    fn default() -> Self {
        Self::from_minutes(15, 10, 5)
    }
}

struct Chain {
    epoch: u64,
    handle: JoinHandle<()>,
}

/// Owns one cancellable timer chain per participant.
///
/// Not ambient state: injected into the engine as a dependency.
pub struct ReminderScheduler {
    delays: EscalationDelays,
    tx: UnboundedSender<EngineEvent>,
    chains: HashMap<String, Chain>,
    next_epoch: u64,
}

impl ReminderScheduler {
    pub fn new(delays: EscalationDelays, tx: UnboundedSender<EngineEvent>) -> Self {
        Self {
            delays,
            tx,
            chains: HashMap::new(),
            next_epoch: 0,
        }
    }

    /// Arm a fresh chain for a participant, superseding any existing one.
    pub fn start(&mut self, participant_id: &str) {
        self.cancel(participant_id);

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let tx = self.tx.clone();
        let id = participant_id.to_string();
        let stages = self.delays.stages();
        let handle = tokio::spawn(async move {
            for (stage, delay) in stages {
                tokio::time::sleep(delay).await;
                let due = EngineEvent::ReminderDue {
                    participant_id: id.clone(),
                    stage,
                    epoch,
                };
                if tx.send(due).is_err() {
                    return; // Engine gone; nothing to remind.
                }
            }
        });

        self.chains.insert(
            participant_id.to_string(),
            Chain { epoch, handle },
        );
    }

    /// Clear any pending chain. Invoked whenever the participant sends a
    /// qualifying reply before escalation completes.
    pub fn cancel(&mut self, participant_id: &str) {
        if let Some(chain) = self.chains.remove(participant_id) {
            chain.handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, chain) in self.chains.drain() {
            chain.handle.abort();
        }
    }

    /// Whether `epoch` belongs to the participant's live chain. Stage events
    /// from a superseded or cancelled chain fail this check and must be
    /// treated as no-ops.
    pub fn is_current(&self, participant_id: &str, epoch: u64) -> bool {
        self.chains
            .get(participant_id)
            .is_some_and(|c| c.epoch == epoch)
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn short_delays() -> EscalationDelays {
        EscalationDelays {
            first: Duration::from_millis(100),
            second: Duration::from_millis(100),
            final_notice: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn chain_fires_three_stages_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReminderScheduler::new(short_delays(), tx);
        scheduler.start("a");

        tokio::time::sleep(Duration::from_millis(350)).await;

        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                EngineEvent::ReminderDue { participant_id, stage, epoch } => {
                    assert_eq!(participant_id, "a");
                    assert!(scheduler.is_current("a", epoch));
                    stages.push(stage);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(
            stages,
            vec![ReminderStage::First, ReminderStage::Second, ReminderStage::Final]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_stage_fires_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReminderScheduler::new(short_delays(), tx);
        scheduler.start("a");
        scheduler.cancel("a");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_supersedes_previous_chain() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReminderScheduler::new(short_delays(), tx);

        scheduler.start("a");
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.start("a");

        // 60ms after the restart: the first chain would have fired by now,
        // the second has not.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        match rx.try_recv().unwrap() {
            EngineEvent::ReminderDue { stage, epoch, .. } => {
                assert_eq!(stage, ReminderStage::First);
                assert!(scheduler.is_current("a", epoch));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_epoch_is_not_current() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReminderScheduler::new(short_delays(), tx);

        scheduler.start("a");
        tokio::time::sleep(Duration::from_millis(150)).await;
        let stale = match rx.try_recv().unwrap() {
            EngineEvent::ReminderDue { epoch, .. } => epoch,
            other => panic!("unexpected event: {other:?}"),
        };

        scheduler.start("a");
        assert!(!scheduler.is_current("a", stale));
    }

    #[tokio::test(start_paused = true)]
    async fn chains_are_independent_per_participant() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = ReminderScheduler::new(short_delays(), tx);

        scheduler.start("a");
        scheduler.start("b");
        scheduler.cancel("a");

        tokio::time::sleep(Duration::from_millis(150)).await;
        match rx.try_recv().unwrap() {
            EngineEvent::ReminderDue { participant_id, .. } => {
                assert_eq!(participant_id, "b");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
