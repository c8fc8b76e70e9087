use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_LOG_LEVEL, RuntimeConfig};

/// Install the global subscriber. Logs go to stderr so stdout stays clean JSON.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(runtime: &RuntimeConfig) {
    let filter = EnvFilter::try_new(&runtime.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
