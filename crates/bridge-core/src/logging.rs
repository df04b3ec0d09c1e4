//! Logging setup
//!
//! Installs a `tracing-subscriber` formatter for the process and forwards the
//! engine's own log output into `tracing`.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{BridgeError, BridgeResult};

/// Target engine log lines are emitted under
pub const ENGINE_TARGET: &str = "rvoip_bridge_core::engine";

/// How the process-wide subscriber is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Floor for bridge and host output
    pub level: Level,
    /// Separate floor for forwarded engine lines; `None` follows `level`
    pub engine_level: Option<Level>,
    pub json: bool,
    /// Callback threads are named, so this tells them apart from the host
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            engine_level: None,
            json: false,
            thread_names: true,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Let the engine be chattier (or quieter) than the bridge
    pub fn with_engine_level(mut self, level: Level) -> Self {
        self.engine_level = Some(level);
        self
    }

    /// Filter directives on top of `RUST_LOG`
    pub fn directives(&self) -> Vec<String> {
        let mut directives = vec![self.level.to_string().to_lowercase()];
        if let Some(engine) = self.engine_level {
            directives.push(format!("{}={}", ENGINE_TARGET, engine.to_string().to_lowercase()));
        }
        directives
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> BridgeResult<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in config.directives() {
        let directive = directive
            .parse()
            .map_err(|e| BridgeError::configuration("logging", format!("{}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_thread_names(config.thread_names);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| BridgeError::configuration("logging", e.to_string()))?;

    tracing::debug!(directives = ?config.directives(), "Logging installed");
    Ok(())
}

/// `--log-level` style names: `error`, `warn`, `info`, `debug`, `trace`
pub fn parse_log_level(level: &str) -> BridgeResult<Level> {
    Level::from_str(level.trim()).map_err(|_| {
        BridgeError::configuration(
            "log_level",
            format!("Unknown log level '{}', expected error, warn, info, debug or trace", level),
        )
    })
}

/// Map an engine log level onto a tracing level
///
/// The engine counts 0 (fatal) to 6 (very detailed trace); anything above 6
/// is treated as trace.
pub fn engine_level(level: u8) -> Level {
    match level {
        0 | 1 => Level::ERROR,
        2 => Level::WARN,
        3 => Level::INFO,
        4 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Emit one engine log line through `tracing`
pub fn forward_engine_log(level: u8, message: &str) {
    let message = message.trim_end();
    match engine_level(level) {
        Level::ERROR => tracing::error!(target: ENGINE_TARGET, engine_level = level, "{}", message),
        Level::WARN => tracing::warn!(target: ENGINE_TARGET, engine_level = level, "{}", message),
        Level::INFO => tracing::info!(target: ENGINE_TARGET, engine_level = level, "{}", message),
        Level::DEBUG => tracing::debug!(target: ENGINE_TARGET, engine_level = level, "{}", message),
        _ => tracing::trace!(target: ENGINE_TARGET, engine_level = level, "{}", message),
    }
}
