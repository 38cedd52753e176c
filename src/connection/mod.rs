//! Connection layer for Junos device communication.
//!
//! Sessions never talk to sockets directly. They drive the transport through
//! the traits defined here, which keeps the transaction logic independent of
//! how bytes reach the device.
//!
//! # Transports
//!
//! - **RPC**: [`DeviceConnector`] opens a [`Device`], which executes CLI text
//!   and named RPCs and hands out a [`ConfigTransaction`] handle for the
//!   lock/load/diff/commit primitives. [`NetconfDevice`] implements both over
//!   any framed [`NetconfChannel`].
//! - **CLI**: [`ShellConnector`] opens a raw [`ShellChannel`]; [`Shell`]
//!   drives it with prompt and error pattern matching.
//!
//! # Example
//!
//! ```rust,ignore
//! use rustible_junos::connection::{DeviceConnector, DeviceTarget};
//!
//! let device = connector.open(&target).await?;
//! let reply = device.cli("show version", Format::Text).await?;
//! println!("{}", reply.text());
//! device.close().await?;
//! ```

/// NETCONF wire adapter implementing [`Device`] and [`ConfigTransaction`].
pub mod netconf;

/// Prompt-driven interactive shell.
pub mod shell;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::error::{NetworkError, Result};
use crate::network::args::RpcCall;
use crate::network::xml::{self, XmlElement};
use crate::network::Format;

pub use netconf::{NetconfChannel, NetconfDevice};
pub use shell::{Shell, ShellState};

/// Errors raised by transport collaborators.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish the session with the device.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected by the device.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A command could not be executed.
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// The device answered with an `rpc-error`.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// An argument was rejected by the transport before being sent.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Connection was closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The requested operation is not supported by this transport.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Opaque bag of device facts.
pub type Facts = serde_json::Map<String, Value>;

// ============================================================================
// Replies
// ============================================================================

/// A reply returned by the device for a command or RPC.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Structured XML reply element
    Xml(XmlElement),
    /// Plain text output
    Text(String),
    /// JSON output
    Json(Value),
}

impl Reply {
    /// Text content of the reply.
    ///
    /// For XML this is the element's direct text, for JSON the serialized
    /// document.
    pub fn text(&self) -> String {
        match self {
            Reply::Xml(element) => element.text().unwrap_or_default().to_string(),
            Reply::Text(text) => text.clone(),
            Reply::Json(value) => value.to_string(),
        }
    }

    pub fn as_xml(&self) -> Option<&XmlElement> {
        match self {
            Reply::Xml(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Serialize an XML reply to its string form; other replies keep their text.
    pub fn to_xml_string(&self) -> Result<String> {
        match self {
            Reply::Xml(element) => xml::to_text(element),
            other => Ok(other.text()),
        }
    }
}

// ============================================================================
// Targets and options
// ============================================================================

/// Everything a connector needs to open a device session.
#[derive(Clone)]
pub struct DeviceTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    /// Per-operation timeout handed to the transport
    pub timeout: Option<Duration>,
    /// Whether the transport should gather facts while opening
    pub gather_facts: bool,
}

impl fmt::Debug for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("timeout", &self.timeout)
            .field("gather_facts", &self.gather_facts)
            .finish()
    }
}

/// Arguments for loading a candidate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    pub format: Format,
    pub merge: bool,
    pub overwrite: bool,
}

/// Options for configuration commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Comment for the commit log
    pub comment: Option<String>,
    /// Minutes until the device reverts the commit unless it is confirmed
    pub confirm: Option<u32>,
}

impl CommitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the confirm timer; zero leaves the commit unconfirmed.
    pub fn with_confirm(mut self, minutes: u32) -> Self {
        if minutes > 0 {
            self.confirm = Some(minutes);
        }
        self
    }
}

/// Highest rollback index kept by Junos.
pub const MAX_ROLLBACK_INDEX: u8 = 49;

/// Rollback target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackTarget {
    /// Rollback to configuration N (0-49)
    Index(u8),
    /// Rollback to rescue configuration
    Rescue,
}

impl RollbackTarget {
    /// Parse a rollback target from a harness value: a number, a numeric
    /// string, or `"rescue"`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let index = match value {
            Value::Number(n) => n.as_u64().ok_or_else(|| {
                NetworkError::invalid_argument("Rollback index must be a positive integer")
            })?,
            Value::String(s) if s.eq_ignore_ascii_case("rescue") => {
                return Ok(RollbackTarget::Rescue)
            }
            Value::String(s) => s.parse::<u64>().map_err(|_| {
                NetworkError::invalid_argument(format!(
                    "Invalid rollback target '{}'. Use 0-49 or 'rescue'",
                    s
                ))
            })?,
            _ => {
                return Err(NetworkError::invalid_argument(
                    "Rollback target must be a number (0-49) or 'rescue'",
                ))
            }
        };

        if index > MAX_ROLLBACK_INDEX as u64 {
            return Err(NetworkError::invalid_argument("Rollback index must be 0-49"));
        }
        Ok(RollbackTarget::Index(index as u8))
    }
}

impl fmt::Display for RollbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackTarget::Index(n) => write!(f, "rollback {}", n),
            RollbackTarget::Rescue => write!(f, "rescue"),
        }
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Opens RPC device sessions.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Arc<dyn Device>>;
}

/// An open RPC session with a device.
#[async_trait]
pub trait Device: Send + Sync {
    /// Host this device session is bound to
    fn host(&self) -> &str;

    /// Close the session
    async fn close(&self) -> ConnectionResult<()>;

    /// Execute raw CLI text, returning output in the requested encoding
    async fn cli(&self, command: &str, format: Format) -> ConnectionResult<Reply>;

    /// Invoke a named RPC. A `format` keyword selects the reply encoding.
    async fn rpc(&self, call: &RpcCall) -> ConnectionResult<Reply>;

    /// Re-read facts from the device
    async fn facts_refresh(&self) -> ConnectionResult<()>;

    /// Facts gathered so far
    fn facts(&self) -> Facts;

    /// Configuration-transaction handle bound to this session
    fn config(&self) -> Box<dyn ConfigTransaction>;
}

/// Configuration-transaction primitives scoped to one device session.
#[async_trait]
pub trait ConfigTransaction: Send + Sync {
    /// Acquire the exclusive configuration lock
    async fn lock(&self) -> ConnectionResult<()>;

    /// Release the configuration lock
    async fn unlock(&self) -> ConnectionResult<()>;

    /// Load candidate configuration text
    async fn load(&self, candidate: &str, options: &LoadOptions) -> ConnectionResult<()>;

    /// Delta between the committed configuration and the candidate;
    /// `None` when nothing changed.
    async fn diff(&self) -> ConnectionResult<Option<String>>;

    /// Validate the candidate without committing it
    async fn commit_check(&self) -> ConnectionResult<bool>;

    /// Commit the candidate
    async fn commit(&self, options: &CommitOptions) -> ConnectionResult<()>;

    /// Load a prior committed revision into the candidate
    async fn rollback(&self, target: &RollbackTarget) -> ConnectionResult<()>;
}

/// Opens interactive shell channels.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Box<dyn ShellChannel>>;
}

/// A raw interactive text channel (an SSH shell, a PTY).
#[async_trait]
pub trait ShellChannel: Send {
    /// Write raw text to the channel
    async fn write(&mut self, data: &str) -> ConnectionResult<()>;

    /// Read the next available chunk; `None` once the channel is closed
    async fn read(&mut self) -> ConnectionResult<Option<String>>;

    /// Close the channel
    async fn close(&mut self) -> ConnectionResult<()>;
}
