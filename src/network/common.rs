//! Common network session types
//!
//! This module provides the types shared by both Junos sessions:
//! - Output and configuration encodings
//! - Queued commands and their dispatch kind
//! - Transport selection

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NetworkError;

// ============================================================================
// Encodings
// ============================================================================

/// Encoding of command output and configuration payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Hierarchical text (curly-brace) format
    Text,
    /// Set commands (e.g. "set system host-name router01")
    Set,
    /// JSON
    Json,
    /// Native XML
    #[default]
    Xml,
}

impl Format {
    /// Every configuration encoding accepted by the sessions.
    pub const SUPPORTED: [Format; 4] = [Format::Text, Format::Set, Format::Json, Format::Xml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Set => "set",
            Format::Json => "json",
            Format::Xml => "xml",
        }
    }

    /// Whether replies in this encoding are plain text
    pub fn is_textual(&self) -> bool {
        matches!(self, Format::Text | Format::Set)
    }

    fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(Format::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Format {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "set" => Ok(Format::Set),
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            _ => Err(NetworkError::invalid_argument(format!(
                "invalid config format.  Valid options are {}",
                Format::supported_list()
            ))),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// How a queued command is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Raw CLI text
    #[default]
    Cli,
    /// Named RPC call with `key=value` arguments
    Rpc,
}

/// A command queued for [`run_commands`](crate::network::NetworkSession::run_commands).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command text, or RPC name plus arguments
    pub text: String,
    /// Requested output encoding; `None` uses the session default
    #[serde(default)]
    pub output: Option<Format>,
    /// Dispatch kind
    #[serde(default)]
    pub kind: CommandKind,
}

impl Command {
    /// A raw CLI command
    pub fn cli(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output: None,
            kind: CommandKind::Cli,
        }
    }

    /// A named RPC command such as `get-interface-information terse=true`
    pub fn rpc(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output: None,
            kind: CommandKind::Rpc,
        }
    }

    pub fn with_output(mut self, output: Format) -> Self {
        self.output = Some(output);
        self
    }

    /// Output encoding, falling back to `default` when none was requested
    pub fn output_or(&self, default: Format) -> Format {
        self.output.unwrap_or(default)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ============================================================================
// Transport Types
// ============================================================================

/// Supported transports for Junos devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkTransport {
    /// Interactive CLI over SSH (default)
    #[default]
    Cli,
    /// NETCONF over SSH (RFC 6241)
    Netconf,
}

impl NetworkTransport {
    /// Port used when the caller does not give one
    pub fn default_port(&self) -> u16 {
        match self {
            NetworkTransport::Cli => 22,
            NetworkTransport::Netconf => 830,
        }
    }
}

impl fmt::Display for NetworkTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkTransport::Cli => write!(f, "cli"),
            NetworkTransport::Netconf => write!(f, "netconf"),
        }
    }
}

impl std::str::FromStr for NetworkTransport {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" | "ssh" => Ok(NetworkTransport::Cli),
            "netconf" | "nc" => Ok(NetworkTransport::Netconf),
            _ => Err(NetworkError::invalid_argument(format!(
                "Unknown transport type: {}. Valid options: cli, netconf",
                s
            ))),
        }
    }
}
