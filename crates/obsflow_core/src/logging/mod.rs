//! Logging for pipeline runs.
//!
//! - `RunLogger`: per-run log file with compact progress filtering and a
//!   tail buffer of collaborator output
//! - `init_tracing`: global `tracing` subscriber for the binary
//!
//! # Example
//!
//! ```no_run
//! use obsflow_core::logging::{LogConfig, RunLogger};
//!
//! let logger = RunLogger::new("run_0", "/tmp/logs", LogConfig::default()).unwrap();
//! logger.phase("Simulate");
//! logger.command("obsflow-simulate --telescope MWA");
//! logger.progress(50);
//! logger.success("Run completed");
//! ```

mod run_logger;
mod types;

pub use run_logger::RunLogger;
pub use types::{LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level`. Output goes to stderr. Calling it
/// twice is a no-op.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .try_init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
