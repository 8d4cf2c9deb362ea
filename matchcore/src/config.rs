// Match-seed configuration: the small set of tunables the core itself
// owns. Everything else a host needs (rosters, tactics, formations) is
// out of scope for this crate and is passed in by the host alongside this
// config, not loaded by it.
//
// **Critical constraint: determinism.** `seed` and `starting_tick` are the
// only two values that affect which sequence of ticks/draws a match
// produces; both must be identical between a recording and its replay.

use serde::{Deserialize, Serialize};

use crate::types::Tick;

/// Seed and boundary configuration for a single match.
///
/// Data-driven and serializable, following this workspace's convention of
/// tunables-as-data rather than hardcoded constants — but this is not a
/// general config-file loader: the core has no files of its own to load.
/// The reserved external/simulation sequence spaces are not configurable
/// here; they are fixed constants (see `types.rs`) because a replay
/// recorded under one boundary would silently misorder under another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSeedConfig {
    /// Seeds the match's single PRNG instance.
    pub seed: u64,
    /// Tick the scheduler starts at. Almost always 0; present for hosts
    /// that resume a partially-recorded match.
    pub starting_tick: Tick,
}

impl Default for MatchSeedConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            starting_tick: 0,
        }
    }
}
