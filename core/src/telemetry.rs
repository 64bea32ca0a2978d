use anyhow::Result;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static SUBSCRIBER_GUARD: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber used by the gait binaries.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(filter: EnvFilter) -> Result<()> {
    if SUBSCRIBER_GUARD.get().is_some() {
        return Ok(());
    }

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)?;
    SUBSCRIBER_GUARD.set(()).ok();

    Ok(())
}
