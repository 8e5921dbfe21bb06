//! Logging setup for the `cli` binary.
//!
//! The filter comes from the `GANTT_LOG` environment variable using
//! `tracing-subscriber` directive syntax (`debug`, `gantt_core=trace`, ...)
//! and defaults to `warn`. Output goes to stderr so stdout stays clean for
//! command results.

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV_VAR: &str = "GANTT_LOG";

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}
