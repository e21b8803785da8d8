//! Log output for binaries and tests, behind the `logging` feature.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a global formatter. The filter is read from `DAWDLE_LOG`, then
/// `RUST_LOG`, and defaults to `info`.
///
/// Fails if a global subscriber has already been set.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("DAWDLE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}
