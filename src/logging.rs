use std::env;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, e.g. `DIRSORT_LOG=debug`.
pub const LOG_ENV: &str = "DIRSORT_LOG";

/// Installs the global subscriber. Logs go to stderr so `--json` output on
/// stdout stays clean. Calling it twice is harmless.
pub fn init_logging() {
    let filter = env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string());
    let filter_layer = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true),
        )
        .with(filter_layer)
        .try_init();
}
