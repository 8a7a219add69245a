//! Logging setup for processes hosting the bridge
//!
//! The library itself only emits `tracing` events. Hosts that do not bring
//! their own subscriber can call [`init`].

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{error::BridgeError, Result};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level ("error", "warn", "info", "debug", "trace")
    pub level: String,
    /// Write log lines to stderr
    pub console_output: bool,
    /// Colored output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// The configured level as a filter
    pub fn parse_level(&self) -> Result<LevelFilter> {
        self.level
            .trim()
            .parse()
            .map_err(|_| BridgeError::Config(format!("Invalid log level: {}", self.level)))
    }
}

/// Install a global subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Returns
/// `Ok(false)` if a subscriber was already installed.
pub fn init(config: &LogConfig) -> Result<bool> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.parse_level()?.into())
        .from_env_lossy();

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_target(false)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialized at level: {}", config.level);
    }
    Ok(installed)
}
