use tracing_subscriber::EnvFilter;

use crate::config::env_bool;

/// Installs the global subscriber. Filter comes from `COURTSIDE_LOG` (default `info`);
/// `COURTSIDE_LOG_JSON=1` switches to JSON lines. Safe to call more than once.
pub fn init() {
    let filter =
        EnvFilter::try_from_env("COURTSIDE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = if env_bool("COURTSIDE_LOG_JSON", false) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
