// Structured logging setup, mirroring this workspace's telemetry crate:
// an env-filter layer (defaulting to "info") plus a compact fmt layer. A
// logging call never substitutes for an `Err` return — this module only
// wires up where logs go, not what the scheduler/wrappers report as
// errors.

#![cfg(feature = "tracing-subscriber")]

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `info` when unset or invalid. Safe to call once per process; a second
/// call is a caller error (panics), matching `tracing`'s own global-
/// subscriber contract.
pub fn init_logging() {
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
