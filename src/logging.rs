//! Logging setup
//!
//! Initializes the tracing subscriber used by the sync layer. Host
//! applications that install their own subscriber can skip this entirely.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes a tracing subscriber with an env-filter.
///
/// Defaults to "synclink=info", can be overridden with the RUST_LOG env var.
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synclink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
