//! Logging setup using `tracing`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (e.g., "info", "debug", "trace")
    pub level: String,
    /// Include module targets in each line
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
        }
    }
}

impl From<&Config> for LogConfig {
    fn from(config: &Config) -> Self {
        Self {
            level: config.log_level.clone(),
            ..Self::default()
        }
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. Returns false if a subscriber was already installed.
pub fn init_logging(config: LogConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(config.with_target))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized at level: {}", config.level);
    }
    installed
}
