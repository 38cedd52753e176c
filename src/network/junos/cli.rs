//! Junos session over the interactive CLI.
//!
//! Commands are written to a [`Shell`] and completion is detected by prompt
//! patterns. Device-side failures are detected by error patterns on the
//! captured output.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ConnectionParams;
use crate::connection::{ConnectionError, Reply, Shell, ShellConnector};
use crate::error::{ErrorKind, NetworkError, Result};
use crate::network::xml;
use crate::network::{Command, Format, NetworkSession, NetworkTransport};

/// End-of-output markers: operational (`>`) and configuration (`#`) mode
/// prompts with up to three nested mode markers, bracketed banner prompts,
/// and the root login shell. Each must start a line, so output lines that
/// merely end in `>` (XML closing tags) never end a read.
pub static CLI_PROMPTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?:^|[\r\n])[\w@+\-.:/\[\]]+(?:\([^)]+\)){0,3}(?:>|#) ?$")
            .expect("Invalid prompt regex"),
        Regex::new(r"(?:^|[\r\n])\[\w+@[\w\-.]+(?: [^\]]+)?\] ?[>#$] ?$")
            .expect("Invalid prompt regex"),
        Regex::new(r"(?:^|[\r\n])\w+@[\w\-.:]+% ?$").expect("Invalid prompt regex"),
    ]
});

/// Output that marks a failed command.
pub static CLI_ERRORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"% ?Error",
        r"% ?Bad secret",
        r"(?i)invalid input",
        r"(?i)(?:incomplete|ambiguous) command",
        r"(?i)connection timed out",
        r"(?i)[^\r\n]+ not found",
        r"'[^']+' +returned error code: ?\d+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid error regex"))
    .collect()
});

/// Configuration-mode context banner printed above the `#` prompt.
static EDIT_CONTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[edit(?: [^\]]*)?\]$").expect("Invalid edit context regex"));

/// A Junos session over the interactive CLI.
pub struct CliSession {
    connector: Arc<dyn ShellConnector>,
    shell: Option<Shell>,
    connected: bool,
}

impl CliSession {
    pub fn new(connector: Arc<dyn ShellConnector>) -> Self {
        Self {
            connector,
            shell: None,
            connected: false,
        }
    }

    /// The prompt matched after the last command
    pub fn prompt(&self) -> Option<&str> {
        self.shell.as_ref().and_then(Shell::prompt)
    }

    async fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            debug!(error = %e, "operation failed, cleaning up session");
            self.disconnect().await;
        }
        result
    }

    /// Open a shell to the device. An open shell is closed first.
    pub async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        if self.shell.is_some() {
            debug!("replacing open shell");
            self.disconnect().await;
        }
        let target = params.to_target(NetworkTransport::Cli, false);
        info!(host = %target.host, port = target.port, "connecting over CLI");

        let opened = match self.connector.open(&target).await {
            Ok(channel) => {
                Shell::open(channel, &CLI_PROMPTS, &CLI_ERRORS, params.timeout_duration()).await
            }
            Err(e) => Err(e),
        };
        let shell = match opened {
            Ok(shell) => shell,
            Err(e) => {
                let err = NetworkError::connection(&target.host, e);
                return self.settle(Err(err)).await;
            }
        };

        let login_shell = shell.prompt().is_some_and(|p| p.trim().ends_with('%'));
        self.shell = Some(shell);
        self.connected = true;

        let mut setup = Vec::new();
        if login_shell {
            setup.push("cli".to_string());
        }
        setup.push("set cli screen-length 0".to_string());
        self.execute(&setup).await.map(|_| ())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut shell) = self.shell.take() {
            match shell.close().await {
                Ok(()) => info!("disconnected"),
                Err(e) => warn!(error = %e, "error closing shell"),
            }
        }
        self.connected = false;
    }

    /// Send each command in order and collect the outputs.
    pub async fn execute(&mut self, commands: &[String]) -> Result<Vec<String>> {
        let result = self.send_all(commands).await;
        self.settle(result).await
    }

    async fn send_all(&mut self, commands: &[String]) -> Result<Vec<String>> {
        let shell = self
            .shell
            .as_mut()
            .ok_or_else(|| NetworkError::new(ErrorKind::Connection, "not connected"))?;

        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            let output = shell.send(command).await.map_err(shell_error)?;
            responses.push(strip_edit_context(&output));
        }
        Ok(responses)
    }

    pub async fn run_commands(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        let texts: Vec<String> = commands
            .iter()
            .map(|cmd| match cmd.output {
                Some(Format::Json) => format!("{} | display json", cmd.text),
                Some(Format::Xml) => format!("{} | display xml", cmd.text),
                _ => cmd.text.clone(),
            })
            .collect();

        let responses = self.execute(&texts).await?;
        let result: Result<Vec<Reply>> = commands
            .iter()
            .zip(responses)
            .map(|(cmd, response)| match cmd.output {
                Some(Format::Json) => serde_json::from_str::<Value>(&response)
                    .map(Reply::Json)
                    .map_err(|e| {
                        NetworkError::parse(format!("unable to load response from device: {}", e))
                    }),
                Some(Format::Xml) => xml::parse(&response).map(Reply::Xml),
                _ => Ok(Reply::Text(response)),
            })
            .collect();
        self.settle(result).await
    }

    /// Enter configuration mode, apply `commands` and commit.
    ///
    /// Returns one response per command; the `configure` and commit echoes
    /// are dropped.
    pub async fn configure(
        &mut self,
        commands: &[String],
        comment: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut batch = Vec::with_capacity(commands.len() + 2);
        batch.push("configure".to_string());
        batch.extend(commands.iter().cloned());
        match comment.filter(|c| !c.is_empty()) {
            Some(comment) => batch.push(format!("commit and-quit comment \"{}\"", comment)),
            None => batch.push("commit and-quit".to_string()),
        }

        let responses = self.execute(&batch).await?;
        info!(commands = commands.len(), "configuration committed");
        Ok(responses
            .into_iter()
            .skip(1)
            .take(commands.len())
            .collect())
    }

    pub async fn load_config(&mut self, commands: &[String]) -> Result<Vec<String>> {
        self.configure(commands, None).await
    }

    /// Show the configuration, as `set` commands when `output` is `set`.
    pub async fn get_config(&mut self, output: &str) -> Result<String> {
        let mut command = String::from("show configuration");
        if output == "set" {
            command.push_str(" | display set");
        }
        let responses = self.execute(&[command]).await?;
        Ok(responses.into_iter().next().unwrap_or_default())
    }
}

fn strip_edit_context(output: &str) -> String {
    output
        .lines()
        .filter(|line| !EDIT_CONTEXT.is_match(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn shell_error(error: ConnectionError) -> NetworkError {
    match error {
        ConnectionError::ExecutionFailed(message) => NetworkError::command_output(message),
        other => NetworkError::command(other),
    }
}

#[async_trait]
impl NetworkSession for CliSession {
    fn transport(&self) -> NetworkTransport {
        NetworkTransport::Cli
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        CliSession::connect(self, params).await
    }

    async fn disconnect(&mut self) {
        CliSession::disconnect(self).await
    }

    async fn run_commands(&mut self, commands: &[Command]) -> Result<Vec<Reply>> {
        CliSession::run_commands(self, commands).await
    }

    async fn get_config(&mut self, format: &str) -> Result<Reply> {
        CliSession::get_config(self, format).await.map(Reply::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_prompt(text: &str) -> bool {
        CLI_PROMPTS.iter().any(|re| re.is_match(text))
    }

    fn matches_error(text: &str) -> bool {
        CLI_ERRORS.iter().any(|re| re.is_match(text))
    }

    #[test]
    fn test_prompts() {
        assert!(matches_prompt("\nadmin@r1> "));
        assert!(matches_prompt("admin@r1#"));
        assert!(matches_prompt("[edit]\nadmin@r1# "));
        assert!(matches_prompt("root@r1:RE:0% "));
        assert!(matches_prompt("[admin@r1 ~]$ "));
        assert!(!matches_prompt("Hostname: r1"));
        assert!(!matches_prompt("Idle  95 percent"));
        assert!(!matches_prompt("<host-name>r1</host-name>"));
        assert!(!matches_prompt("  </software-information>"));
    }

    #[test]
    fn test_prompt_keeps_user() {
        let m = CLI_PROMPTS[0].find("show version\r\nadmin@r1> ").unwrap();
        assert_eq!(m.as_str().trim(), "admin@r1>");
    }

    #[test]
    fn test_errors() {
        assert!(matches_error("% Bad secret"));
        assert!(matches_error("%Error opening tftp"));
        assert!(matches_error("syntax error: Invalid input detected"));
        assert!(matches_error("error: AMBIGUOUS COMMAND"));
        assert!(matches_error("error: file 'foo' not found"));
        assert!(matches_error("'show foo' returned error code: 1"));
        assert!(!matches_error("% bad secret"));
        assert!(!matches_error("Hostname: r1"));
    }

    #[test]
    fn test_strip_edit_context() {
        assert_eq!(strip_edit_context("[edit]"), "");
        assert_eq!(
            strip_edit_context("warning: statement not configured\n[edit system]"),
            "warning: statement not configured"
        );
        assert_eq!(strip_edit_context("set system host-name r1"), "set system host-name r1");
    }
}
