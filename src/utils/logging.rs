// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset: our own progress at INFO,
/// dependencies (reqwest, hyper, html5ever) only when they warn.
const DEFAULT_FILTER: &str = "warn,report_extractor=info";

/// Sets up console logging. Per-document failures only ever show up here,
/// so everything goes to stderr and stays visible next to progress output.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Logging setup complete.");
}
