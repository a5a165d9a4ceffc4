use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "retail_etl=info";

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initializes logging to stderr, human-readable or as JSON lines.
///
/// Stdout stays free for command output. Calling it twice is a no-op.
pub fn init_logging(json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter());
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
