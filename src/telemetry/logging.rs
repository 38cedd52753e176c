//! Structured logging setup using the tracing crate.
//!
//! Library code only emits events; installing a subscriber is left to the
//! embedding application, which can use [`LoggingBuilder`] for the usual
//! console and JSON setups.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::{NetworkError, Result};
use crate::telemetry::config::{LogFormat, LogLevel, LoggingConfig};

/// Builder for the global logging subscriber.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuilder {
    config: LoggingConfig,
}

impl LoggingBuilder {
    /// Create a new logging builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing configuration.
    pub fn from_config(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Set the log format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Set ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.config.ansi_colors = enabled;
        self
    }

    /// Include target in logs.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.config.with_target = enabled;
        self
    }

    /// Include file/line information.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.config.with_file = enabled;
        self
    }

    /// Set filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Install the global subscriber.
    ///
    /// Fails with an invalid-argument error when a global subscriber is
    /// already installed.
    pub fn init(self) -> Result<()> {
        let env_filter = self.build_filter();

        match self.config.format {
            LogFormat::Pretty => self.init_pretty(env_filter),
            LogFormat::Compact => self.init_compact(env_filter),
            LogFormat::Json => self.init_json(env_filter),
        }
    }

    /// `RUST_LOG` wins, then the configured directive, then the level.
    pub(crate) fn build_filter(&self) -> EnvFilter {
        let default_filter = self.config.level.as_str();

        if let Some(ref filter) = self.config.filter {
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(filter))
                .unwrap_or_else(|_| EnvFilter::new(default_filter))
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
        }
    }

    fn init_pretty(self, env_filter: EnvFilter) -> Result<()> {
        let layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(self.config.ansi_colors)
            .with_target(self.config.with_target)
            .with_file(self.config.with_file)
            .with_line_number(self.config.with_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .map_err(init_error)
    }

    fn init_compact(self, env_filter: EnvFilter) -> Result<()> {
        let layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(self.config.ansi_colors)
            .with_target(self.config.with_target)
            .with_file(self.config.with_file)
            .with_line_number(self.config.with_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .map_err(init_error)
    }

    fn init_json(self, env_filter: EnvFilter) -> Result<()> {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(self.config.with_target)
            .with_file(self.config.with_file)
            .with_line_number(self.config.with_file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .map_err(init_error)
    }
}

fn init_error(e: tracing_subscriber::util::TryInitError) -> NetworkError {
    NetworkError::invalid_argument(format!("unable to install log subscriber: {}", e))
}

/// Helper function to initialize logging with verbosity level.
pub fn init_from_verbosity(verbosity: u8) -> Result<()> {
    let config = LoggingConfig {
        level: LogLevel::from_verbosity(verbosity),
        with_file: verbosity >= 3,
        with_target: verbosity >= 2,
        ..Default::default()
    };

    LoggingBuilder::from_config(config).init()
}

/// Helper function to initialize JSON logging for production.
pub fn init_json_logging() -> Result<()> {
    LoggingBuilder::from_config(LoggingConfig::production()).init()
}
