//! # Rustible Junos - Junos device sessions
//!
//! Async sessions for managing Juniper Junos devices over NETCONF or the
//! interactive CLI. Both sessions share one contract: connect, run commands,
//! fetch configuration, load and commit configuration, roll back, disconnect.
//!
//! ## Core Concepts
//!
//! - **Sessions**: [`NetconfSession`](network::NetconfSession) and
//!   [`CliSession`](network::CliSession), one per device connection
//! - **Transactions**: configuration changes run as
//!   lock, load, diff, commit check, commit, unlock; any failure releases the
//!   lock and disconnects before the error is returned
//! - **Connectors**: transport collaborators behind the traits in
//!   [`connection`], so sessions never touch sockets directly
//! - **Errors**: every failure is a [`NetworkError`](error::NetworkError)
//!   with a kind and a flattened message
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Harness (module runner)                  │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//!              ┌─────────────────┴─────────────────┐
//!              ▼                                   ▼
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │      NetconfSession      │       │        CliSession        │
//! │  (lock/load/diff/commit) │       │   (configure + prompts)  │
//! └──────────────────────────┘       └──────────────────────────┘
//!              │                                   │
//!              ▼                                   ▼
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │  Device/ConfigTransaction│       │   Shell over ShellChannel│
//! │  (NetconfDevice)         │       │                          │
//! └──────────────────────────┘       └──────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use rustible_junos::prelude::*;
//!
//! let mut session = NetconfSession::new(connector);
//! session.connect(&ConnectionParams::new("r1", "admin").with_password(pw)).await?;
//!
//! let diff = session
//!     .load_config(&lines, &LoadConfigOptions::new().with_comment("ntp servers"))
//!     .await?;
//! session.disconnect().await;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod network;
pub mod telemetry;

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::{ConnectionParams, LoadConfigOptions};
    pub use crate::connection::{
        CommitOptions, ConfigTransaction, ConnectionError, ConnectionResult, Device,
        DeviceConnector, DeviceTarget, Facts, Reply, RollbackTarget, ShellChannel,
        ShellConnector,
    };
    pub use crate::error::{ErrorKind, NetworkError, Result};
    pub use crate::network::junos::session_for;
    pub use crate::network::{
        CliSession, Command, CommandKind, Format, NetconfSession, NetworkSession,
        NetworkTransport,
    };
}
