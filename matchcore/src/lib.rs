// matchcore — deterministic tick-driven event scheduler and replay core
// for a football match simulation.
//
// This crate owns the computational spine a match engine is built on:
// the tick model, the priority-ordered event scheduler, the external-
// event gate that keeps operator input (substitutions, tactical changes,
// shouts) replay-safe, and the two execution wrappers (real-time paced,
// headless drain-to-end) that drive it. Ball physics, player AI, vision,
// and everything else that actually plays the match are out of scope:
// this crate sees them only as scheduled callbacks and PRNG consumers.
//
// Module overview:
// - `types.rs`:     Tick/Seq type aliases, `EventType`, `EventHandle`.
// - `event.rs`:      The indexed min-heap and `EventScheduler<C>`.
// - `external.rs`:   `ExternalGate`, `ExternalPayload`, the replay log.
// - `match_.rs`:     `Match<C>` — scheduler + gate + log + PRNG, bundled.
// - `config.rs`:     `MatchSeedConfig`.
// - `realtime.rs`:   `RealTimeWrapper<C>`, the `Clock` trait.
// - `headless.rs`:   `HeadlessWrapper`.
// - `replay.rs`:      `ReplayFile<S, M>`, `MatchHash`.
// - `error.rs`:       `ScheduleError`, `GateError`, `WrapperError`, `ReplayError`.
// - `logging.rs`:     `tracing-subscriber` initializer (feature-gated).
// - `prng`:           Re-exported from `matchcore-prng` — xoshiro256++
//                      seeded via SplitMix64, the single PRNG instance a
//                      match draws every stochastic decision from.
//
// **Critical constraint: determinism.** Every stochastic decision in a
// match must route through the PRNG owned by `Match`; every non-
// deterministic input must go through the external gate. No `HashMap`
// iteration order, no system time, no OS entropy in core state.

pub mod config;
pub mod error;
pub mod event;
pub mod external;
pub mod headless;
#[cfg(feature = "tracing-subscriber")]
pub mod logging;
pub mod match_;
pub use matchcore_prng as prng;
pub mod realtime;
pub mod replay;
pub mod types;

pub use error::{GateError, ReplayError, ScheduleError, WrapperError};
pub use event::{Callback, EventScheduler, FiredEvent, Payload};
pub use external::{ExternalEventLog, ExternalGate, ExternalPayload, ExternalRecord};
pub use headless::HeadlessWrapper;
pub use match_::Match;
pub use realtime::{Clock, FakeClock, RealTimeWrapper, SystemClock};
pub use replay::{compute_match_hash, MatchHash, ReplayFile};
pub use types::{EventHandle, EventType, LogIndex, Tick};
