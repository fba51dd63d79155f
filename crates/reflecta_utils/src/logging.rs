use tracing_subscriber::EnvFilter;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "REFLECTA_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Installs a formatted `tracing` subscriber for the current process.
///
/// The filter comes from `REFLECTA_LOG`, then `RUST_LOG`, then `warn`.
/// Calling this more than once, or after another subscriber was installed,
/// is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init();
}

/// Like [`init_logging`] but routes output through the test writer so that
/// `cargo test` captures it per test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
