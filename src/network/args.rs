//! Command-argument parsing for named RPC calls.
//!
//! A named RPC can be issued from a single command string such as
//! `get-interface-information terse=true interface-name=ge-0/0/0`. The string
//! is tokenized with shell-style quoting (double quotes only, no escapes, no
//! comments) and every token after the RPC name is decoded as a typed
//! `key=value` argument.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NetworkError, Result};

/// A typed RPC argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcValue {
    Bool(bool),
    Int(u64),
    Str(String),
}

impl RpcValue {
    /// Decode a raw argument value.
    ///
    /// `true`/`false` (any case) become booleans, all-digit values become
    /// integers, everything else stays a string.
    pub fn decode(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            RpcValue::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            RpcValue::Bool(false)
        } else if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            raw.parse()
                .map(RpcValue::Int)
                .unwrap_or_else(|_| RpcValue::Str(raw.to_string()))
        } else {
            RpcValue::Str(raw.to_string())
        }
    }
}

impl fmt::Display for RpcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcValue::Bool(b) => write!(f, "{}", b),
            RpcValue::Int(i) => write!(f, "{}", i),
            RpcValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for RpcValue {
    fn from(value: bool) -> Self {
        RpcValue::Bool(value)
    }
}

impl From<u64> for RpcValue {
    fn from(value: u64) -> Self {
        RpcValue::Int(value)
    }
}

impl From<&str> for RpcValue {
    fn from(value: &str) -> Self {
        RpcValue::Str(value.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(value: String) -> Self {
        RpcValue::Str(value)
    }
}

/// A named RPC with its keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCall {
    /// RPC name as written by the caller
    pub name: String,
    /// Keyword arguments in the order given
    pub kwargs: IndexMap<String, RpcValue>,
}

impl RpcCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kwargs: IndexMap::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<RpcValue>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// The RPC element name on the wire (`get_configuration` -> `get-configuration`)
    pub fn method_name(&self) -> String {
        self.name.replace('_', "-")
    }

    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        self.kwargs.get(key)
    }
}

/// Tokenize a command string.
///
/// Tokens are separated by whitespace. A double-quoted run is kept in one
/// token with the quotes removed, so `comment="hello world"` yields
/// `comment=hello world`. An unterminated quote is an error.
pub fn split(value: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current: Option<String> = None;
    let mut quoted = false;

    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.get_or_insert_with(String::new);
            }
            c if c.is_whitespace() && !quoted => {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
            }
            c => current.get_or_insert_with(String::new).push(c),
        }
    }

    if quoted {
        return Err(NetworkError::invalid_argument(format!(
            "no closing quotation in '{}'",
            value
        )));
    }
    if let Some(token) = current {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Parse a command string into an RPC name and typed keyword arguments.
pub fn rpc_args(args: &str) -> Result<RpcCall> {
    let mut tokens = split(args)?.into_iter();
    let name = tokens
        .next()
        .ok_or_else(|| NetworkError::invalid_argument("missing RPC name"))?;

    let mut call = RpcCall::new(name);
    for token in tokens {
        let (key, value) = token.split_once('=').ok_or_else(|| {
            NetworkError::invalid_argument(format!(
                "invalid RPC argument '{}', expected key=value",
                token
            ))
        })?;
        call.kwargs.insert(key.to_string(), RpcValue::decode(value));
    }
    Ok(call)
}
