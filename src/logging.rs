// Log output for hosts that do not install their own tracing subscriber.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives, e.g. `livecapture=debug`.
pub const LOG_ENV: &str = "LIVECAPTURE_LOG";

/// Install a fmt subscriber filtered by `LIVECAPTURE_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set, so tests and hosts can
/// call it freely.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}
