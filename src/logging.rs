use tracing_subscriber::EnvFilter;

/// Install the global subscriber; dev builds log at info, release at warn.
///
/// `RUST_LOG` overrides the default filter. Thread names are kept so each
/// line can be traced back to its `food-worker-N` or the game loop.
pub fn init() {
    let default_level = if cfg!(debug_assertions) { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Tests and repeated calls may already have a subscriber installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
}
