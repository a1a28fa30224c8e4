//! Logging configuration
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingSettings;
use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter for the given settings, honouring `RUST_LOG`
pub fn filter_for(settings: &LoggingSettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level)
            .with_context(|| format!("invalid log level '{}'", settings.level)),
    }
}

/// Install the global subscriber
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(filter_for(settings)?);

    let installed = match settings.format.as_str() {
        "json" => registry.with(fmt::layer().json().with_current_span(false)).try_init(),
        _ => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}
