//! Log output setup for the binary

use tracing_subscriber::EnvFilter;

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. Later calls are no-ops.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}
