//! One-shot `tracing` wiring shared by both binaries: env-filtered logfmt
//! output to stderr, so a running node's logs are greppable and a deployed
//! fleet can ship them to any logfmt-speaking collector without a bespoke
//! parser.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset: everything at `info`, matching
/// the signal-to-noise ratio operators expect from a single-process store.
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Must be called exactly once, as early as
/// possible in `main`; a second call panics, consistent with
/// `tracing_subscriber`'s own `set_global_default` contract.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_logfmt::layer())
        .init();
}
