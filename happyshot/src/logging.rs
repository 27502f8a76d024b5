//! Logging setup

use tracing_subscriber::EnvFilter;

/// Install a `tracing` fmt subscriber for the HappyShot crates.
///
/// `RUST_LOG` takes precedence; otherwise the HappyShot targets log at
/// `info`, or `debug` when `debug` is set. Returns `false` if a global
/// subscriber was already installed.
pub fn init_logging(debug: bool) -> bool {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "happyshot={level},happyshot_core={level},happyshot_media={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
