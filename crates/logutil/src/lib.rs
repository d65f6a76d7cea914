//! Utilities for logging.
//!
//! Libraries in this workspace only emit `tracing` events. Binaries and tests
//! decide where those events go by calling one of the init functions here.

use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<Verbosity> for Level {
    fn from(value: Verbosity) -> Self {
        match value {
            Verbosity::Info => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Trace => Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Build the filter, letting `RUST_LOG` override the requested verbosity.
fn env_filter(verbosity: Verbosity) -> EnvFilter {
    let level: Level = verbosity.into();
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install a global subscriber writing to stderr.
///
/// Does nothing if a global subscriber has already been set.
pub fn init(verbosity: Verbosity, format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Pretty => builder.with_target(true).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Install a subscriber for tests.
///
/// Output is captured by the test harness. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(Verbosity::Debug))
        .with_test_writer()
        .try_init();
}
