//! Error types for Junos sessions.
//!
//! Every failure a session surfaces is a [`NetworkError`]. The error remembers
//! which kind of failure produced it, but its `Display` output is a single
//! flattened, human-readable message so callers see one uniform error surface
//! regardless of transport.

use std::fmt;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Boxed underlying cause carried by a [`NetworkError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The kind of failure a [`NetworkError`] was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport could not be opened.
    Connection,
    /// A command or RPC failed on the device.
    Command,
    /// The candidate configuration could not be loaded.
    ConfigLoad,
    /// Commit-check rejected the candidate.
    Validation,
    /// The commit itself failed.
    Commit,
    /// The configuration lock could not be acquired.
    Lock,
    /// The configuration lock could not be released.
    Unlock,
    /// A caller-supplied argument was rejected before reaching the device.
    InvalidArgument,
    /// XML could not be parsed or serialized.
    Parse,
    /// The operation is not supported by this session.
    NotImplemented,
}

impl ErrorKind {
    /// Short stable name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Command => "command",
            ErrorKind::ConfigLoad => "config_load",
            ErrorKind::Validation => "validation",
            ErrorKind::Commit => "commit",
            ErrorKind::Lock => "lock",
            ErrorKind::Unlock => "unlock",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Parse => "parse",
            ErrorKind::NotImplemented => "not_implemented",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error type surfaced to callers.
///
/// The message already contains the underlying cause text, so printing the
/// error is enough for reporting. The cause itself stays reachable through
/// [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct NetworkError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl NetworkError {
    /// Create an error without an underlying cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    ///
    /// The cause text is appended to `context` as `"<context>: <cause>"`.
    pub fn with_source(kind: ErrorKind, context: &str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            kind,
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    pub fn connection(host: &str, source: impl Into<BoxError>) -> Self {
        Self::with_source(
            ErrorKind::Connection,
            &format!("unable to connect to {}", host),
            source,
        )
    }

    pub fn command(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::Command, "unable to get cli output", source)
    }

    /// Command failure detected in captured device output.
    pub fn command_output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Command, message)
    }

    pub fn config_load(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::ConfigLoad, "unable to load config", source)
    }

    pub fn rollback(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::ConfigLoad, "unable to rollback config", source)
    }

    pub fn validation() -> Self {
        Self::new(ErrorKind::Validation, "commit check failed")
    }

    pub fn commit(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::Commit, "unable to commit config", source)
    }

    pub fn lock(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::Lock, "unable to lock config", source)
    }

    pub fn unlock(source: impl Into<BoxError>) -> Self {
        Self::with_source(ErrorKind::Unlock, "unable to unlock config", source)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn not_implemented(operation: &str) -> Self {
        Self::new(
            ErrorKind::NotImplemented,
            format!("{} is not supported", operation),
        )
    }

    /// The kind of failure this error was raised for.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The flattened message, identical to the `Display` output.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
