//! Log setup for hook runs

use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// Output goes to stderr, which the platform captures into the unit log, so
/// ANSI colours are off. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or("info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}
