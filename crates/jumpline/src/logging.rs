//! Logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` if set, otherwise one level per `-v`.
#[must_use]
pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var_os("RUST_LOG").is_some() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(match verbosity {
        0 => "jumpline=warn,jumpline_pty=warn",
        1 => "jumpline=info,jumpline_pty=info",
        2 => "jumpline=debug,jumpline_pty=debug",
        _ => "jumpline=trace,jumpline_pty=trace",
    })
}

/// Install the global subscriber, writing to stderr. Later calls are
/// ignored.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(create_env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
