//! Junos network sessions
//!
//! This module provides the session layer the harness drives: connect, run
//! commands, fetch configuration and disconnect, over either transport.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +----------------------+
//! |  NetconfSession  |---->| Device /             |
//! |                  |     | ConfigTransaction    |
//! +------------------+     +----------------------+
//!                                     |
//! +------------------+     +----------------------+
//! |  CliSession      |---->| Shell / ShellChannel |
//! +------------------+     +----------------------+
//! ```
//!
//! Both sessions implement [`NetworkSession`]; [`junos::session_for`] picks
//! one from a [`NetworkTransport`].

pub mod args;
pub mod common;
pub mod junos;
pub mod xml;

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::connection::Reply;
use crate::error::Result;

// Re-export main types for convenience
pub use args::{rpc_args, split, RpcCall, RpcValue};
pub use common::{Command, CommandKind, Format, NetworkTransport};
pub use junos::{CliSession, NetconfSession};
pub use xml::{to_structured, to_text, XmlElement};

/// Operations shared by every Junos session.
#[async_trait]
pub trait NetworkSession: Send {
    /// Transport this session speaks
    fn transport(&self) -> NetworkTransport;

    fn is_connected(&self) -> bool;

    /// Open the transport to the device described by `params`
    async fn connect(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Close the transport. Safe to call when not connected.
    async fn disconnect(&mut self);

    /// Execute queued commands in order, one reply per command
    async fn run_commands(&mut self, commands: &[Command]) -> Result<Vec<Reply>>;

    /// Fetch the device configuration in the named encoding
    async fn get_config(&mut self, format: &str) -> Result<Reply>;
}
