//! Tracing setup for the harness.
//!
//! The gate's audit trail and the loop's session log lines go through
//! tracing, so the default level is `info` rather than dev-only. Override
//! with `RUST_LOG` (e.g. `RUST_LOG=autodev=debug` to see allow decisions).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber: stderr, compact format, `RUST_LOG`
/// respected with an `info` default.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
