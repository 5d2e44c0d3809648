use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a human-readable subscriber honouring `RUST_LOG` (default `info`).
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}

/// Like [`init_tracing`] but emits one JSON object per event
pub fn init_json_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .try_init()
        .map_err(|e| anyhow!("Failed to install JSON tracing subscriber: {e}"))
}
