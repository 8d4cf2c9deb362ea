// Error taxonomy for the scheduler, the external gate, the two wrappers,
// and the replay loader. One enum per bucket, grounded on the same
// `thiserror`-derived, non-retrying style used elsewhere in this
// workspace's telemetry and bus crates: validation failures are
// programmer errors and are surfaced immediately, never swallowed or
// retried.

use thiserror::Error;

use crate::types::EventHandle;

/// Errors raised by [`crate::event::EventScheduler`]'s public operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("event type {0:?} cannot be scheduled directly; external events must go through the gate")]
    InvalidType(crate::types::EventType),

    #[error("handle {0:?} does not refer to a pending event on this scheduler")]
    NotPending(EventHandle),

    #[error("handle {0:?} belongs to a different scheduler instance")]
    ForeignHandle(EventHandle),
}

/// Errors raised by [`crate::external::ExternalGate`] issuance and use.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("get_exclusive_external_gate() has already been called on this scheduler")]
    AlreadyIssued,

    #[error("external tick_offset must be non-negative (it is, by type, but is documented here for completeness)")]
    InvalidOffset,
}

/// Errors raised by the real-time and headless wrappers.
#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("headless wrapper is already running")]
    HeadlessAlreadyRunning,

    #[error("real-time wrapper is already running")]
    RealTimeAlreadyRunning,

    #[error("yield_every_ticks must be greater than zero")]
    InvalidYieldInterval,

    #[error("a scheduled callback panicked: {0}")]
    CallbackPanicked(String),
}

/// Errors raised when loading a [`crate::replay::ReplayFile`].
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("external event at log index {index} has seq {seq}, outside the reserved range [{min}, {max}]")]
    SeqOutOfRange {
        index: usize,
        seq: u64,
        min: u64,
        max: u64,
    },

    #[error("external events are not monotonically non-decreasing in tick when sorted by seq (index {index})")]
    NonMonotonicTick { index: usize },

    #[error("replay_version {found:?} is incompatible with this engine's {expected:?}")]
    VersionMismatch { found: String, expected: String },
}
