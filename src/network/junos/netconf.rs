//! Junos session over NETCONF.
//!
//! Configuration changes run as one transaction against the device:
//!
//! ```text
//! lock -> load candidate -> diff -> commit check -> [commit] -> unlock
//! ```
//!
//! Any failure inside a transaction releases the lock if it is held and
//! disconnects before the error reaches the caller, so a device is never left
//! locked by this session.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConnectionParams, LoadConfigOptions};
use crate::connection::{
    CommitOptions, ConfigTransaction, Device, DeviceConnector, Facts, LoadOptions, Reply,
    RollbackTarget,
};
use crate::error::{ErrorKind, NetworkError, Result};
use crate::network::args::{rpc_args, RpcCall};
use crate::network::{Command, CommandKind, Format, NetworkSession, NetworkTransport};

/// A Junos session over NETCONF.
pub struct NetconfSession {
    connector: Arc<dyn DeviceConnector>,
    device: Option<Arc<dyn Device>>,
    config: Option<Box<dyn ConfigTransaction>>,
    locked: bool,
    connected: bool,
    default_output: Format,
}

impl NetconfSession {
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            device: None,
            config: None,
            locked: false,
            connected: false,
            default_output: Format::Xml,
        }
    }

    /// Output encoding used for commands that do not request one
    pub fn with_default_output(mut self, format: Format) -> Self {
        self.default_output = format;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn default_output(&self) -> Format {
        self.default_output
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Pass `result` through, releasing the lock and disconnecting first
    /// when it is an error.
    async fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            debug!(error = %e, "operation failed, cleaning up session");
            if self.locked {
                if let Some(config) = self.config.as_ref() {
                    if let Err(unlock_err) = config.unlock().await {
                        warn!(error = %unlock_err, "unable to release configuration lock");
                    }
                }
            }
            self.disconnect().await;
        }
        result
    }

    fn device(&self) -> Result<&Arc<dyn Device>> {
        self.device
            .as_ref()
            .ok_or_else(|| NetworkError::new(ErrorKind::Connection, "not connected"))
    }

    fn config(&self) -> Result<&dyn ConfigTransaction> {
        self.config
            .as_deref()
            .ok_or_else(|| NetworkError::new(ErrorKind::Connection, "not connected"))
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Open a session to the device. An open session is closed first.
    pub async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        if self.device.is_some() {
            debug!("replacing open NETCONF session");
            self.disconnect().await;
        }
        let target = params.to_target(NetworkTransport::Netconf, false);
        info!(host = %target.host, port = target.port, "connecting over NETCONF");

        match self.connector.open(&target).await {
            Ok(device) => {
                self.config = Some(device.config());
                self.device = Some(device);
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                let err = NetworkError::connection(&target.host, e);
                self.settle(Err(err)).await
            }
        }
    }

    pub async fn disconnect(&mut self) {
        self.config = None;
        if let Some(device) = self.device.take() {
            match device.close().await {
                Ok(()) => info!(host = device.host(), "disconnected"),
                Err(e) => warn!(host = device.host(), error = %e, "error closing session"),
            }
        }
        self.connected = false;
        self.locked = false;
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Execute raw CLI commands in the requested encoding.
    pub async fn cli(&mut self, commands: &[String], output: Format) -> Result<Vec<Reply>> {
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.exec_cli(command, output).await;
            replies.push(self.settle(result).await?);
        }
        Ok(replies)
    }

    /// Parse `command` into a named RPC and invoke it.
    pub async fn rpc(&mut self, command: &str, output: Format) -> Result<Reply> {
        let result = match rpc_args(command) {
            Ok(call) => self.exec_rpc(call, output).await,
            Err(e) => Err(e),
        };
        self.settle(result).await
    }

    pub async fn run_commands(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        let result = self.dispatch(commands).await;
        let replies = self.settle(result).await?;

        commands
            .iter()
            .zip(replies)
            .map(|(command, reply)| {
                if command.output_or(self.default_output) == Format::Xml {
                    reply.to_xml_string().map(Reply::Text)
                } else if command.kind == CommandKind::Rpc {
                    Ok(Reply::Text(reply.text().trim().to_string()))
                } else {
                    Ok(reply)
                }
            })
            .collect()
    }

    async fn dispatch(&self, commands: &[Command]) -> Result<Vec<Reply>> {
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            let output = command.output_or(self.default_output);
            let reply = match command.kind {
                CommandKind::Cli => self.exec_cli(&command.text, output).await?,
                CommandKind::Rpc => self.exec_rpc(rpc_args(&command.text)?, output).await?,
            };
            replies.push(reply);
        }
        Ok(replies)
    }

    async fn exec_cli(&self, command: &str, output: Format) -> Result<Reply> {
        debug!(%command, %output, "executing cli command");
        self.device()?
            .cli(command, output)
            .await
            .map_err(NetworkError::command)
    }

    async fn exec_rpc(&self, mut call: RpcCall, output: Format) -> Result<Reply> {
        debug!(rpc = %call.method_name(), %output, "executing rpc");
        call.kwargs.insert("format".to_string(), output.as_str().into());
        self.device()?
            .rpc(&call)
            .await
            .map_err(NetworkError::command)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Fetch the configuration. Text and set output is returned trimmed.
    pub async fn get_config(&mut self, format: &str) -> Result<Reply> {
        let format = match format.parse::<Format>() {
            Ok(format) => format,
            Err(e) => return self.settle(Err(e)).await,
        };
        let result = self
            .exec_rpc(RpcCall::new("get-configuration"), format)
            .await
            .map(|reply| {
                if format.is_textual() {
                    Reply::Text(reply.text().trim().to_string())
                } else {
                    reply
                }
            });
        self.settle(result).await
    }

    /// Load `candidate` and commit it when it changes the configuration.
    ///
    /// Returns the diff between the committed configuration and the
    /// candidate, whether or not a commit happened.
    pub async fn load_config(
        &mut self,
        candidate: &[String],
        options: &LoadConfigOptions,
    ) -> Result<Option<String>> {
        let result = self.apply_config(candidate, options).await;
        self.settle(result).await
    }

    async fn apply_config(
        &mut self,
        candidate: &[String],
        options: &LoadConfigOptions,
    ) -> Result<Option<String>> {
        self.acquire_lock().await?;

        let load = LoadOptions {
            format: options.format,
            merge: options.merge(),
            overwrite: options.overwrite(),
        };
        debug!(format = %load.format, merge = load.merge, overwrite = load.overwrite, "loading candidate");
        self.config()?
            .load(&candidate.join("\n"), &load)
            .await
            .map_err(NetworkError::config_load)?;

        let diff = self.compute_diff().await?;
        self.validate().await?;

        if options.commit && diff.is_some() {
            self.commit(options.comment.as_deref(), options.confirm)
                .await?;
        }

        self.release_lock().await?;
        Ok(diff)
    }

    /// Configuration writes to startup storage are not available over NETCONF.
    pub fn save_config(&self) -> Result<()> {
        Err(NetworkError::not_implemented("save_config"))
    }

    pub async fn get_facts(&mut self, refresh: bool) -> Result<Facts> {
        if refresh {
            let result = match self.device() {
                Ok(device) => device.facts_refresh().await.map_err(|e| {
                    NetworkError::with_source(ErrorKind::Command, "unable to refresh facts", e)
                }),
                Err(e) => Err(e),
            };
            self.settle(result).await?;
        }
        let result = self.device().map(|device| device.facts());
        self.settle(result).await
    }

    pub async fn lock_config(&mut self) -> Result<()> {
        let result = self.acquire_lock().await;
        self.settle(result).await
    }

    pub async fn unlock_config(&mut self) -> Result<()> {
        let result = self.release_lock().await;
        self.settle(result).await
    }

    pub async fn check_config(&mut self) -> Result<()> {
        let result = self.validate().await;
        self.settle(result).await
    }

    pub async fn commit_config(&mut self, comment: Option<&str>, confirm: Option<u32>) -> Result<()> {
        let result = self.commit(comment, confirm).await;
        self.settle(result).await
    }

    /// Roll the candidate back to a prior revision and optionally commit it.
    ///
    /// A failed rollback is logged and the transaction continues with the
    /// diff and commit.
    pub async fn rollback_config(
        &mut self,
        target: &RollbackTarget,
        commit: bool,
        comment: Option<&str>,
    ) -> Result<Option<String>> {
        let result = self.acquire_lock().await;
        self.settle(result).await?;

        info!(%target, "rolling back configuration");
        if let Err(e) = self.config()?.rollback(target).await {
            warn!(error = %NetworkError::rollback(e), "rollback failed, continuing");
        }

        let result = self.finish_rollback(commit, comment).await;
        self.settle(result).await
    }

    async fn finish_rollback(&mut self, commit: bool, comment: Option<&str>) -> Result<Option<String>> {
        let diff = self.compute_diff().await?;
        if commit {
            self.commit(comment, None).await?;
        }
        self.release_lock().await?;
        Ok(diff)
    }

    // ========================================================================
    // Transaction primitives
    // ========================================================================

    async fn acquire_lock(&mut self) -> Result<()> {
        if self.locked {
            return Err(NetworkError::new(
                ErrorKind::Lock,
                "unable to lock config: already locked by this session",
            ));
        }
        self.config()?.lock().await.map_err(NetworkError::lock)?;
        self.locked = true;
        debug!("configuration locked");
        Ok(())
    }

    async fn release_lock(&mut self) -> Result<()> {
        self.config()?.unlock().await.map_err(NetworkError::unlock)?;
        self.locked = false;
        debug!("configuration unlocked");
        Ok(())
    }

    async fn compute_diff(&self) -> Result<Option<String>> {
        self.config()?.diff().await.map_err(|e| {
            NetworkError::with_source(ErrorKind::Command, "unable to compute config diff", e)
        })
    }

    async fn validate(&self) -> Result<()> {
        let passed = self.config()?.commit_check().await.map_err(|e| {
            NetworkError::with_source(ErrorKind::Validation, "commit check failed", e)
        })?;
        if passed {
            Ok(())
        } else {
            Err(NetworkError::validation())
        }
    }

    async fn commit(&self, comment: Option<&str>, confirm: Option<u32>) -> Result<()> {
        let mut options = CommitOptions::new();
        if let Some(comment) = comment {
            options = options.with_comment(comment);
        }
        if let Some(minutes) = confirm {
            options = options.with_confirm(minutes);
        }
        self.config()?
            .commit(&options)
            .await
            .map_err(NetworkError::commit)?;
        info!(comment = ?options.comment, confirm = ?options.confirm, "configuration committed");
        Ok(())
    }
}

#[async_trait]
impl NetworkSession for NetconfSession {
    fn transport(&self) -> NetworkTransport {
        NetworkTransport::Netconf
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        NetconfSession::connect(self, params).await
    }

    async fn disconnect(&mut self) {
        NetconfSession::disconnect(self).await
    }

    async fn run_commands(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        NetconfSession::run_commands(self, commands).await
    }

    async fn get_config(&mut self, format: &str) -> Result<Reply> {
        NetconfSession::get_config(self, format).await
    }
}
