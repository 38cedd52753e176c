//! Configuration for Junos sessions
//!
//! Handles the two parameter sets the harness hands to a session:
//! - Connection parameters (host, credentials, transport, timeout)
//! - Options for a configuration load transaction

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::connection::DeviceTarget;
use crate::error::{NetworkError, Result};
use crate::network::{Format, NetworkTransport};

/// Default per-operation timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Parameters for connecting to a device
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Device hostname or address
    pub host: String,

    /// Port; defaults per transport (830 NETCONF, 22 CLI)
    #[serde(default)]
    pub port: Option<u16>,

    /// Login user
    pub username: String,

    /// Login password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-operation timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Transport used to reach the device
    #[serde(default)]
    pub transport: NetworkTransport,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            transport: NetworkTransport::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_transport(mut self, transport: NetworkTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Parse connection parameters from the harness's parameter map
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            NetworkError::invalid_argument(format!("invalid connection parameters: {}", e))
        })
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Port to dial for `transport` when none was given
    pub fn port_for(&self, transport: NetworkTransport) -> u16 {
        self.port.unwrap_or_else(|| transport.default_port())
    }

    /// Build the connector target for `transport`.
    pub fn to_target(&self, transport: NetworkTransport, gather_facts: bool) -> DeviceTarget {
        DeviceTarget {
            host: self.host.clone(),
            port: self.port_for(transport),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: Some(self.timeout_duration()),
            gather_facts,
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Options for a configuration load transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfigOptions {
    /// `merge`, `overwrite`, or anything else for a full replace
    pub update: String,

    /// Commit log comment
    pub comment: Option<String>,

    /// Confirm timer in minutes; only used when greater than zero
    pub confirm: Option<u32>,

    /// Encoding of the candidate lines
    pub format: Format,

    /// Commit when the candidate changes the configuration
    pub commit: bool,
}

impl Default for LoadConfigOptions {
    fn default() -> Self {
        Self {
            update: "merge".to_string(),
            comment: None,
            confirm: None,
            format: Format::Text,
            commit: true,
        }
    }
}

impl LoadConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update(mut self, update: impl Into<String>) -> Self {
        self.update = update.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_confirm(mut self, minutes: u32) -> Self {
        self.confirm = Some(minutes);
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn merge(&self) -> bool {
        self.update == "merge"
    }

    pub fn overwrite(&self) -> bool {
        self.update == "overwrite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_params_from_value_defaults() {
        let params = ConnectionParams::from_value(&json!({
            "host": "r1.example.net",
            "username": "admin",
            "password": "secret"
        }))
        .unwrap();

        assert_eq!(params.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(params.transport, NetworkTransport::Cli);
        assert_eq!(params.port_for(NetworkTransport::Netconf), 830);
        assert_eq!(params.port_for(NetworkTransport::Cli), 22);
    }

    #[test]
    fn test_params_from_value_invalid() {
        let err = ConnectionParams::from_value(&json!({"host": "r1"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = ConnectionParams::from_value(&json!({
            "host": "r1",
            "username": "admin",
            "transport": "telnet"
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_to_target_uses_explicit_port() {
        let params = ConnectionParams::new("r1", "admin")
            .with_port(2830)
            .with_password("secret")
            .with_timeout(30);
        let target = params.to_target(NetworkTransport::Netconf, false);

        assert_eq!(target.port, 2830);
        assert_eq!(target.timeout, Some(Duration::from_secs(30)));
        assert!(!target.gather_facts);
        assert!(!format!("{:?}", params).contains("secret"));
    }

    #[test]
    fn test_load_options_defaults() {
        let opts = LoadConfigOptions::default();
        assert!(opts.merge());
        assert!(!opts.overwrite());
        assert_eq!(opts.format, Format::Text);
        assert!(opts.commit);

        let opts = LoadConfigOptions::new().with_update("replace");
        assert!(!opts.merge());
        assert!(!opts.overwrite());
    }

    #[test]
    fn test_load_options_deserialize_partial() {
        let opts: LoadConfigOptions =
            serde_json::from_value(json!({"update": "overwrite", "format": "set"})).unwrap();
        assert!(opts.overwrite());
        assert_eq!(opts.format, Format::Set);
        assert!(opts.commit);
    }
}
