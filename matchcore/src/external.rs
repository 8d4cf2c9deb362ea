// The external-event gate: the sole path by which an operator (manager
// UI, replay loader) can inject a non-deterministic input into an
// otherwise fully deterministic simulation.
//
// The gate is handed out at most once per scheduler lifetime. It assigns
// sequence numbers from the reserved external range and enforces the
// `min_external_tick` barrier so an event scheduled while tick `t` is
// being drained always lands at `t + 1`, never behind events that have
// already fired at `t`.
//
// **Critical constraint: determinism.** Scheduling and logging an
// external event are atomic — there is no path that does one without the
// other. See `Match::schedule_external`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GateError;
use crate::event::{Callback, EventScheduler};
use crate::types::{EventHandle, LogIndex, Seq, Tick};

/// The closed union of operator-injected event payloads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExternalPayload {
    Substitution {
        player_out_id: u32,
        player_in_id: u32,
    },
    TacticalChange {
        team_id: u32,
        formation_id: Option<u32>,
        instruction_updates: Vec<InstructionUpdate>,
    },
    Shout {
        team_id: u32,
        shout_kind: ShoutKind,
        target_player_id: Option<u32>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShoutKind {
    Encourage,
    Criticize,
    TacticalReminder,
    PressHigher,
    DropDeeper,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstructionUpdate {
    pub key: String,
    pub value: String,
}

/// One entry in the append-only external-event log: the persisted replay
/// input beyond the seed and static setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub tick: Tick,
    pub seq: Seq,
    pub payload: ExternalPayload,
}

/// Append-only log of every external event accepted by the match.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExternalEventLog {
    records: Vec<ExternalRecord>,
}

impl ExternalEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ExternalRecord] {
        &self.records
    }

    fn push(&mut self, record: ExternalRecord) -> LogIndex {
        self.records.push(record);
        LogIndex(self.records.len() - 1)
    }
}

/// The one-shot object returned by
/// [`EventScheduler::mark_gate_issued`][crate::event::EventScheduler]'s
/// caller. Only [`crate::match_::Match::new`] ever constructs one.
pub struct ExternalGate {
    _private: (),
}

impl ExternalGate {
    /// Obtain the gate from a fresh scheduler. Fails if a gate has already
    /// been issued for this scheduler instance.
    pub(crate) fn issue<C>(scheduler: &mut EventScheduler<C>) -> Result<Self, GateError> {
        crate::event::issue_gate(scheduler)?;
        Ok(Self { _private: () })
    }

    /// Enqueue an external event and append it to `log`, atomically.
    /// Returns the event's handle, its assigned tick, and the log index of
    /// the appended record.
    pub(crate) fn schedule<C>(
        &self,
        scheduler: &mut EventScheduler<C>,
        log: &mut ExternalEventLog,
        tick_offset: u32,
        payload: ExternalPayload,
        callback: Callback<C>,
    ) -> (EventHandle, LogIndex) {
        let (handle, tick, seq) = scheduler.schedule_external(tick_offset, payload.clone(), callback);
        debug!(tick, seq, "external event scheduled");
        let index = log.push(ExternalRecord { tick, seq, payload });
        (handle, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventScheduler, FiredEvent};

    fn noop(_ctx: &mut (), _s: &mut EventScheduler<()>, _e: FiredEvent) {}

    #[test]
    fn gate_can_only_be_issued_once() {
        let mut sched = EventScheduler::<()>::new();
        let _gate = ExternalGate::issue(&mut sched).unwrap();
        assert!(matches!(
            ExternalGate::issue(&mut sched),
            Err(GateError::AlreadyIssued)
        ));
    }

    #[test]
    fn barrier_pushes_mid_tick_injection_to_next_tick() {
        // Scenario S3.
        let mut sched = EventScheduler::<()>::new();
        let mut ctx = ();
        let gate = ExternalGate::issue(&mut sched).unwrap();
        let mut log = ExternalEventLog::new();

        let (_, first_idx) = gate.schedule(
            &mut sched,
            &mut log,
            0,
            ExternalPayload::Shout {
                team_id: 1,
                shout_kind: ShoutKind::Encourage,
                target_player_id: None,
            },
            noop,
        );
        assert_eq!(log.records()[first_idx.0].tick, 0);

        fn inject_mid_tick(_ctx: &mut (), _s: &mut EventScheduler<()>, _e: FiredEvent) {
            // The actual injection happens below via the gate directly, since
            // a plain fn callback cannot close over `gate`/`log`. This
            // callback exists only to occupy tick 0's drain.
        }
        sched
            .schedule(0, crate::types::EventType::BallPhysics, inject_mid_tick, crate::event::Payload::BallPhysics)
            .unwrap();

        // Simulate "inside a simulation callback scheduled at tick 0, the
        // match requests schedule_external(0, ..)" by bumping the barrier
        // the same way `advance` does, then scheduling through the gate.
        sched.advance(&mut ctx, 0);
        assert_eq!(sched.min_external_tick(), 1);

        let (_, second_idx) = gate.schedule(
            &mut sched,
            &mut log,
            0,
            ExternalPayload::Shout {
                team_id: 1,
                shout_kind: ShoutKind::Encourage,
                target_player_id: None,
            },
            noop,
        );
        assert_eq!(log.records()[second_idx.0].tick, 1);
    }
}
