//! Diagnostic tracing for the loop.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`. It is
//! separate from the progress UI and from the transcripts written under
//! `.looper/logs/`, which are always produced.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`, or `info` with `--verbose`.
///
/// ```bash
/// RUST_LOG=looper=debug looper run
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
