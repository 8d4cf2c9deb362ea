// The replay file format: a match seed, host-supplied static setup, the
// external-event log, optional host-supplied match events, and a content
// hash of the final deterministic output.
//
// The core does not know what a team roster or a formation looks like
// (out of scope, §1), so the static setup and match-event payloads are
// generic over host-supplied types; this crate is responsible only for
// `replay_version`, `match_seed`, `external_events`, `match_hash`, and
// validating the invariants below on load.

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::external::ExternalRecord;
use crate::types::{Tick, EXTERNAL_SEQ_MAX, EXTERNAL_SEQ_MIN};

/// The replay format version this crate produces and accepts. Any
/// incompatible change to the fields below must bump the major version.
pub const REPLAY_VERSION: &str = "1.0.0";

/// A digest over the final deterministic outputs of a match, used to
/// detect drift across engine versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchHash(pub [u8; 32]);

impl std::fmt::Display for MatchHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Hash caller-supplied bytes representing final deterministic state. The
/// core does not prescribe what goes into `bytes` beyond "it must be a
/// function of only deterministic state".
pub fn compute_match_hash(bytes: &[u8]) -> MatchHash {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    MatchHash(*hasher.finalize().as_bytes())
}

/// A complete, bit-exact replay record. `S` is the host's static match
/// setup (rosters, tactics, formations, ...); `M` is the host's optional
/// observed match events (goals, cards, statistics), for display only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayFile<S, M> {
    pub replay_version: String,
    pub match_seed: u64,
    pub static_setup: S,
    pub external_events: Vec<ExternalRecord>,
    pub match_events: Option<Vec<M>>,
    pub match_hash: MatchHash,
}

impl<S, M> ReplayFile<S, M> {
    pub fn new(
        match_seed: u64,
        static_setup: S,
        external_events: Vec<ExternalRecord>,
        match_events: Option<Vec<M>>,
        match_hash: MatchHash,
    ) -> Self {
        Self {
            replay_version: REPLAY_VERSION.to_string(),
            match_seed,
            static_setup,
            external_events,
            match_events,
            match_hash,
        }
    }

    /// Validate the format invariants: sequence numbers fall in the
    /// reserved external range, and ticks are monotonically non-decreasing
    /// when the log is sorted by `seq` (a well-formed log is already
    /// sorted; this re-sorts defensively to protect against tampering).
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.replay_version != REPLAY_VERSION {
            return Err(ReplayError::VersionMismatch {
                found: self.replay_version.clone(),
                expected: REPLAY_VERSION.to_string(),
            });
        }

        for (index, record) in self.external_events.iter().enumerate() {
            if record.seq < EXTERNAL_SEQ_MIN || record.seq > EXTERNAL_SEQ_MAX {
                return Err(ReplayError::SeqOutOfRange {
                    index,
                    seq: record.seq,
                    min: EXTERNAL_SEQ_MIN,
                    max: EXTERNAL_SEQ_MAX,
                });
            }
        }

        let mut by_seq: Vec<&ExternalRecord> = self.external_events.iter().collect();
        by_seq.sort_by_key(|r| r.seq);
        let mut last_tick: Option<Tick> = None;
        for (index, record) in by_seq.into_iter().enumerate() {
            if let Some(prev) = last_tick {
                if record.tick < prev {
                    return Err(ReplayError::NonMonotonicTick { index });
                }
            }
            last_tick = Some(record.tick);
        }

        Ok(())
    }
}
