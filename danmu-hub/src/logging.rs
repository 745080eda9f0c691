//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "danmu_hub=info,danmu_sources=info,tower_http=warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default directive. Safe to call once per process;
/// a second call is a no-op so tests can race it.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
