// `Match`: the host-facing wrapper that bundles a scheduler with its
// exclusive external gate, the external-event log, and the match's single
// PRNG instance — the three things §5 says a host commonly groups
// together, plus the thing that must never be duplicated (the gate).
//
// This is the only place `ExternalGate::issue` is called, which is what
// makes "the gate can be obtained at most once" true in practice: nothing
// outside this module can construct one.

use matchcore_prng::MatchRng;

use crate::config::MatchSeedConfig;
use crate::error::GateError;
use crate::event::{Callback, EventScheduler};
use crate::external::{ExternalEventLog, ExternalGate, ExternalPayload, ExternalRecord};
use crate::types::LogIndex;

/// A scheduler, its external gate, the external-event log, and the
/// match's PRNG, bundled the way a host typically owns them together.
///
/// Generic over a host context `C`, forwarded unchanged to every
/// scheduled callback. `Match` does not interpret `C`; it only carries
/// the `EventScheduler<C>` it wraps.
pub struct Match<C> {
    scheduler: EventScheduler<C>,
    gate: ExternalGate,
    log: ExternalEventLog,
    rng: MatchRng,
}

impl<C> Match<C> {
    /// Construct a fresh match from seed configuration. Issues the
    /// scheduler's external gate immediately, so no other code path can
    /// ever obtain it.
    pub fn new(config: &MatchSeedConfig) -> Result<Self, GateError> {
        let mut scheduler = EventScheduler::new();
        scheduler.set_starting_tick(config.starting_tick);
        let gate = ExternalGate::issue(&mut scheduler)?;
        Ok(Self {
            scheduler,
            gate,
            log: ExternalEventLog::new(),
            rng: MatchRng::new(config.seed),
        })
    }

    pub fn scheduler(&self) -> &EventScheduler<C> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut EventScheduler<C> {
        &mut self.scheduler
    }

    pub fn rng_mut(&mut self) -> &mut MatchRng {
        &mut self.rng
    }

    /// Enqueue an external event and append it to the log, atomically.
    /// Returns the log index of the appended record.
    pub fn schedule_external(
        &mut self,
        tick_offset: u32,
        payload: ExternalPayload,
        callback: Callback<C>,
    ) -> LogIndex {
        let (_handle, index) =
            self.gate
                .schedule(&mut self.scheduler, &mut self.log, tick_offset, payload, callback);
        index
    }

    pub fn external_events(&self) -> &[ExternalRecord] {
        self.log.records()
    }
}
