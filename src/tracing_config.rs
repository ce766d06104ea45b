use tracing_subscriber::{EnvFilter, fmt};

/// Install the global diagnostic subscriber.
///
/// Host processes call this once at startup; test binaries call it freely,
/// since repeated installation is a no-op. `RUST_LOG` overrides the
/// default filter, which keeps reelfeed's own lifecycle events at info
/// and everything else at warnings.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,reelfeed=info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
