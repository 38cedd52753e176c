//! Prompt-driven interactive shell.
//!
//! [`Shell`] turns a raw [`ShellChannel`] into a request/response channel:
//! each command is written, output is accumulated until a prompt pattern
//! matches the end of the buffer, and the echo and prompt lines are stripped
//! from what is returned. Error patterns are checked on every read so device
//! failures surface as soon as they are printed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, trace};

use super::{ConnectionError, ConnectionResult, ShellChannel};

/// Default time to wait for each chunk of output.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b[=>]|\x08").expect("Invalid ANSI escape regex")
});

/// Where the shell is in the command/prompt exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    /// No command in flight
    Idle,
    /// A command was written and output is being collected
    AwaitingPrompt,
    /// An error pattern matched, the channel read failed, or the prompt never came
    ErrorDetected,
    /// The prompt came back and the response was returned
    Done,
}

/// An interactive shell session over a [`ShellChannel`].
pub struct Shell {
    channel: Box<dyn ShellChannel>,
    prompts: &'static [Regex],
    errors: &'static [Regex],
    timeout: Duration,
    state: ShellState,
    prompt: Option<String>,
}

impl Shell {
    /// Wrap a channel and wait for the first prompt.
    pub async fn open(
        channel: Box<dyn ShellChannel>,
        prompts: &'static [Regex],
        errors: &'static [Regex],
        timeout: Duration,
    ) -> ConnectionResult<Self> {
        let mut shell = Shell {
            channel,
            prompts,
            errors,
            timeout,
            state: ShellState::AwaitingPrompt,
            prompt: None,
        };
        shell.receive(None).await?;
        shell.state = ShellState::Idle;
        debug!(prompt = ?shell.prompt, "shell ready");
        Ok(shell)
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    /// The most recently matched prompt
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Send one command and return its output.
    pub async fn send(&mut self, command: &str) -> ConnectionResult<String> {
        debug!(%command, "sending shell command");
        self.state = ShellState::AwaitingPrompt;
        if let Err(e) = self.channel.write(&format!("{}\r", command)).await {
            self.state = ShellState::ErrorDetected;
            return Err(e);
        }
        self.receive(Some(command)).await
    }

    pub async fn close(&mut self) -> ConnectionResult<()> {
        self.state = ShellState::Idle;
        self.channel.close().await
    }

    async fn receive(&mut self, command: Option<&str>) -> ConnectionResult<String> {
        let mut buffer = String::new();

        loop {
            let chunk = match tokio::time::timeout(self.timeout, self.channel.read()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => return self.fail(ConnectionError::ConnectionClosed),
                Ok(Err(e)) => return self.fail(e),
                Err(_) => {
                    return self.fail(ConnectionError::ExecutionFailed(
                        "timeout waiting for prompt".to_string(),
                    ))
                }
            };
            trace!(%chunk, "shell output");
            buffer.push_str(&ANSI_ESCAPE.replace_all(&chunk, ""));

            if let Some(line) = self.find_error(&buffer) {
                return self.fail(ConnectionError::ExecutionFailed(line));
            }
            if let Some((start, prompt)) = self.find_prompt(&buffer) {
                self.prompt = Some(prompt);
                self.state = ShellState::Done;
                return Ok(sanitize(&buffer[..start], command));
            }
        }
    }

    fn fail<T>(&mut self, error: ConnectionError) -> ConnectionResult<T> {
        self.state = ShellState::ErrorDetected;
        Err(error)
    }

    /// The full output line containing the first error match.
    fn find_error(&self, buffer: &str) -> Option<String> {
        self.errors.iter().find_map(|re| {
            re.find(buffer).map(|m| {
                let start = buffer[..m.start()]
                    .rfind(['\r', '\n'])
                    .map_or(0, |i| i + 1);
                let end = buffer[m.end()..]
                    .find(['\r', '\n'])
                    .map_or(buffer.len(), |i| m.end() + i);
                buffer[start..end].trim().to_string()
            })
        })
    }

    /// Match prompts against the end of the buffer, ignoring one trailing
    /// newline. Returns where the prompt starts and the prompt itself.
    fn find_prompt(&self, buffer: &str) -> Option<(usize, String)> {
        let tail = buffer.strip_suffix('\n').unwrap_or(buffer);
        self.prompts
            .iter()
            .find_map(|re| re.find(tail))
            .map(|m| (m.start(), m.as_str().trim().to_string()))
    }
}

/// Drop the command echo from the first line of `output`.
fn sanitize(output: &str, command: Option<&str>) -> String {
    let mut lines = output.lines().map(|line| line.trim_end_matches('\r')).peekable();
    if let Some(command) = command.filter(|c| !c.is_empty()) {
        lines.next_if(|line| line.trim() == command.trim());
    }
    lines.collect::<Vec<_>>().join("\n").trim_matches('\n').to_string()
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("state", &self.state)
            .field("prompt", &self.prompt)
            .field("timeout", &self.timeout)
            .finish()
    }
}
