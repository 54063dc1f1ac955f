// Bootstrap utilities for binary initialization

use crate::config::Settings;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for JSON logging
///
/// Used by the entrypoint binary, where logs are scraped by the orchestrator.
pub fn init_json_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_thread_ids(true),
        )
        .init();
}

/// Initialize tracing for human-readable logging
///
/// Used by the registrar and runner binaries, which talk to an operator.
pub fn init_human_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Log non-fatal configuration warnings at startup
pub fn log_config_warnings(settings: &Settings) {
    for warning in settings.warnings() {
        warn!("Config: {warning}");
    }
}
