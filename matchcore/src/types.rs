// Core types shared across the scheduler, the external gate, and the
// wrappers: the tick/sequence number space, the event type taxonomy, and
// the opaque handle callers hold to a scheduled event.
//
// **Critical constraint: determinism.** `EventType`'s declaration order is
// load-bearing — it is used directly as the secondary sort key when two
// events share a tick (see `event.rs`). Reordering variants changes replay
// output for every existing recording.

use serde::{Deserialize, Serialize};

/// Absolute simulated time, in ticks (one tick = one millisecond of match
/// time). Stored as `u64` internally; the public API accepts/returns tick
/// offsets and durations as `u32`, per the stable contract.
pub type Tick = u64;

/// A monotonically increasing ordering key, unique within its sequence
/// space. See [`EXTERNAL_SEQ_MIN`]/[`EXTERNAL_SEQ_MAX`]/[`SIMULATION_SEQ_MIN`].
pub type Seq = u64;

/// Lowest sequence number reserved for external (operator-injected) events.
pub const EXTERNAL_SEQ_MIN: Seq = 0;
/// Highest sequence number reserved for external events, inclusive.
pub const EXTERNAL_SEQ_MAX: Seq = 999_999;
/// Lowest sequence number assigned to simulation-originated events.
pub const SIMULATION_SEQ_MIN: Seq = 1_000_000;

/// The event type taxonomy. Declaration order is the secondary sort key:
/// within a single tick, lower-ordinal types fire first. `External` is
/// deliberately first so operator input always precedes simulation
/// reaction at the same tick (see `external.rs`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    External = 0,
    BallPhysics = 1,
    PlayerPhysics = 2,
    PlayerAi = 3,
    Vision = 4,
    HeadAi = 5,
    HeadPhysics = 6,
    MatchControl = 7,
}

/// A caller-held reference to a scheduled event.
///
/// `index` locates the event's slot in the scheduler's arena; `generation`
/// is bumped every time a slot is freed and handed to a new event, so a
/// stale handle from a cancelled-and-reused slot is rejected rather than
/// silently aliasing an unrelated event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Index into a [`crate::external::ExternalEventLog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogIndex(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_ordering_matches_priority() {
        assert!(EventType::External < EventType::BallPhysics);
        assert!(EventType::BallPhysics < EventType::PlayerPhysics);
        assert!(EventType::PlayerPhysics < EventType::PlayerAi);
        assert!(EventType::PlayerAi < EventType::Vision);
        assert!(EventType::Vision < EventType::HeadAi);
        assert!(EventType::HeadAi < EventType::HeadPhysics);
        assert!(EventType::HeadPhysics < EventType::MatchControl);
    }

    #[test]
    fn sequence_spaces_do_not_overlap() {
        assert!(EXTERNAL_SEQ_MAX < SIMULATION_SEQ_MIN);
    }
}
