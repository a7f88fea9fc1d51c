//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`; `DEBUG` raises
/// this crate to `debug`. Deployed environments log JSON.
pub fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let default_directive = if config.debug {
        format!("{},ticket_presence=debug", config.log_level)
    } else {
        config.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_directive))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.environment.is_deployed() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}
