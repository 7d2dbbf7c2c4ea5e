//! ==============================================================================
//! telemetry.rs - tracing subscriber setup
//! ==============================================================================
//!
//! `RUST_LOG` wins when set; otherwise the level from `[logging]` applies.
//! safe to call more than once (later calls are no-ops), which keeps tests
//! that build a whole controller from fighting over the global subscriber.
//!
//! ==============================================================================

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
}
