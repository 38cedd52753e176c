//! Junos sessions over NETCONF and the interactive CLI.

pub mod cli;
pub mod netconf;

use std::sync::Arc;

pub use cli::CliSession;
pub use netconf::NetconfSession;

use super::{NetworkSession, NetworkTransport};
use crate::connection::{DeviceConnector, ShellConnector};

/// Build the session for `transport`, wired to the matching connector.
pub fn session_for(
    transport: NetworkTransport,
    devices: Arc<dyn DeviceConnector>,
    shells: Arc<dyn ShellConnector>,
) -> Box<dyn NetworkSession> {
    match transport {
        NetworkTransport::Netconf => Box::new(NetconfSession::new(devices)),
        NetworkTransport::Cli => Box::new(CliSession::new(shells)),
    }
}
