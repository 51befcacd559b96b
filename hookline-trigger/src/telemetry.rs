//! Logging setup for processes hosting the trigger engine

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `tracing` subscriber
///
/// `RUST_LOG` takes precedence; `default_filter` (e.g. `"hookline_trigger=info"`)
/// applies when it is unset or invalid. Fails if a global subscriber is already
/// installed.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
