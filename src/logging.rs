//! Structured logging setup, grounded on the teacher's `logging.rs`:
//! `tracing_subscriber` with an `EnvFilter` driven by `<PREFIX>_LOG_LEVEL`
//! (falling back to `RUST_LOG`), matching spec.md §6's recognized
//! environment variables.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Safe to call more than once;
/// subsequent calls are no-ops.
pub fn init(env_prefix: &str) {
    let level_var = format!("{env_prefix}LOG_LEVEL");
    let filter = std::env::var(&level_var)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .try_init();
}
