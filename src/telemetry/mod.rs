//! Telemetry for Junos sessions.
//!
//! Sessions log through the `tracing` macros:
//! - `info` for connect, disconnect, commit and rollback
//! - `debug` for each command, RPC and lock transition
//! - `warn` when best-effort cleanup fails
//!
//! Credentials are never logged.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rustible_junos::telemetry::{LogFormat, LoggingBuilder};
//!
//! LoggingBuilder::new()
//!     .with_format(LogFormat::Json)
//!     .with_filter("rustible_junos=debug")
//!     .init()?;
//! ```

pub mod config;
pub mod logging;

// Re-exports for convenience
pub use config::{LogFormat, LogLevel, LoggingConfig};
pub use logging::{init_from_verbosity, init_json_logging, LoggingBuilder};
