//! Tracing subscriber setup.
//!
//! Events go to stderr so the summary printed on stdout stays clean. The
//! filter is read from `SHELVE_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "SHELVE_LOG";

pub fn init_logger() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init so a second call (e.g. from tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .try_init();
}
