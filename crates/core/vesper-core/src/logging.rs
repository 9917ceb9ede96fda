//! Logging setup. Thin by design (spec §1 treats "logging setup" as an
//! opaque external concern) but still routed through `tracing` rather than
//! ad hoc `println!`, matching how every other service in the teacher
//! codebase logs.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global `tracing` subscriber. Reads `VESPER_LOG_LEVEL`
/// (falling back to `RUST_LOG`, then `"info"`) for the filter directive.
/// Safe to call once at process start; calling it twice will panic, same as
/// the underlying `tracing_subscriber::registry().init()` it wraps.
pub fn init_logging() {
    let level = std::env::var("VESPER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
