//! Logging init for binaries: `tracing` events to stderr.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` (e.g. `"info"` or
/// `"warn,spreadsheet_intake=debug"`) applies when it is unset or invalid. Calling this
/// more than once is harmless: later calls leave the first subscriber in place.
pub fn init_logging(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
