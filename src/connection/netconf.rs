//! NETCONF wire adapter for Junos devices.
//!
//! [`NetconfDevice`] renders Junos XML API requests (RFC 6241 framing with
//! the NETCONF 1.0 end-of-message delimiter) and parses the replies. Moving
//! the bytes is left to a [`NetconfChannel`], typically the `netconf` SSH
//! subsystem.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{
    CommitOptions, ConfigTransaction, ConnectionError, ConnectionResult, Device, Facts,
    LoadOptions, Reply, RollbackTarget, MAX_ROLLBACK_INDEX,
};
use crate::network::args::{RpcCall, RpcValue};
use crate::network::xml::{self, XmlElement};
use crate::network::Format;

// ============================================================================
// NETCONF Constants
// ============================================================================

/// NETCONF 1.0 message delimiter
pub const NETCONF_1_0_DELIMITER: &str = "]]>]]>";

/// NETCONF base namespace (RFC 6241)
const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

const CLIENT_CAPABILITIES: [&str; 4] = [
    "urn:ietf:params:netconf:base:1.0",
    "urn:ietf:params:netconf:capability:candidate:1.0",
    "urn:ietf:params:netconf:capability:confirmed-commit:1.0",
    "urn:ietf:params:netconf:capability:validate:1.0",
];

/// One framed request/reply exchange with the device.
#[async_trait]
pub trait NetconfChannel: Send + Sync {
    /// Send a complete framed message and return the complete framed reply
    async fn exchange(&self, message: &str) -> ConnectionResult<String>;

    /// Close the underlying channel
    async fn close(&self) -> ConnectionResult<()>;
}

// ============================================================================
// NETCONF Errors
// ============================================================================

/// A single `rpc-error` element from a reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetconfError {
    pub error_type: String,
    pub error_tag: String,
    pub error_severity: String,
    pub error_message: Option<String>,
    pub error_path: Option<String>,
}

impl NetconfError {
    fn from_element(element: &XmlElement) -> Self {
        let field = |name: &str| element.find_text(name).map(str::to_string);
        NetconfError {
            error_type: field("error-type").unwrap_or_default(),
            error_tag: field("error-tag").unwrap_or_default(),
            error_severity: field("error-severity").unwrap_or_else(|| "error".to_string()),
            error_message: field("error-message"),
            error_path: field("error-path"),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_severity == "error"
    }
}

impl fmt::Display for NetconfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_message.as_deref().unwrap_or("Unknown error"))?;
        if !self.error_tag.is_empty() {
            write!(f, " [{}]", self.error_tag)?;
        }
        if let Some(ref path) = self.error_path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

fn collect_errors(element: &XmlElement, errors: &mut Vec<NetconfError>) {
    if element.name == "rpc-error" {
        errors.push(NetconfError::from_element(element));
        return;
    }
    for child in &element.children {
        collect_errors(child, errors);
    }
}

// ============================================================================
// NETCONF Device
// ============================================================================

struct Inner {
    host: String,
    channel: Box<dyn NetconfChannel>,
    session_id: RwLock<Option<u32>>,
    capabilities: RwLock<Vec<String>>,
    facts: RwLock<Facts>,
    message_id: AtomicU32,
}

/// Junos device session over NETCONF.
///
/// Cloning is cheap; clones share the channel. The configuration handle
/// returned by [`Device::config`] is such a clone.
#[derive(Clone)]
pub struct NetconfDevice {
    inner: Arc<Inner>,
}

impl NetconfDevice {
    pub fn new(host: impl Into<String>, channel: impl NetconfChannel + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                host: host.into(),
                channel: Box::new(channel),
                session_id: RwLock::new(None),
                capabilities: RwLock::new(Vec::new()),
                facts: RwLock::new(Facts::new()),
                message_id: AtomicU32::new(1),
            }),
        }
    }

    /// Exchange hello messages and record the server's session and capabilities.
    pub async fn establish(&self) -> ConnectionResult<()> {
        let hello = CLIENT_CAPABILITIES.iter().fold(
            XmlElement::new("capabilities"),
            |caps, cap| caps.with_child(XmlElement::new("capability").with_text(*cap)),
        );
        let hello = XmlElement::new("hello")
            .with_attr("xmlns", NETCONF_NS)
            .with_child(hello);

        let response = self.inner.channel.exchange(&frame(&hello)?).await?;
        let server = parse_framed(&response)?;

        *self.inner.session_id.write() = server
            .find_text("session-id")
            .and_then(|id| id.parse().ok());
        *self.inner.capabilities.write() = server
            .child("capabilities")
            .map(|caps| {
                caps.children_named("capability")
                    .filter_map(|c| c.text().map(|t| t.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            host = %self.inner.host,
            session_id = ?self.session_id(),
            "NETCONF session established"
        );
        Ok(())
    }

    pub fn session_id(&self) -> Option<u32> {
        *self.inner.session_id.read()
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.inner
            .capabilities
            .read()
            .iter()
            .any(|c| c.contains(capability))
    }

    /// Send one RPC operation and return the reply content.
    ///
    /// The content is the first element inside `rpc-reply`, or the
    /// `rpc-reply` itself when the device answered with bare text. The
    /// content keeps the namespace bindings declared on `rpc-reply`.
    async fn send_rpc(&self, operation: XmlElement) -> ConnectionResult<XmlElement> {
        let message_id = self.inner.message_id.fetch_add(1, Ordering::SeqCst);
        let rpc = XmlElement::new("rpc")
            .with_attr("xmlns", NETCONF_NS)
            .with_attr("message-id", message_id.to_string())
            .with_child(operation);

        let message = frame(&rpc)?;
        trace!(host = %self.inner.host, %message, "sending NETCONF rpc");
        let response = self.inner.channel.exchange(&message).await?;
        let mut reply = parse_framed(&response)?;

        let mut errors = Vec::new();
        collect_errors(&reply, &mut errors);
        let errors: Vec<String> = errors
            .iter()
            .filter(|e| e.is_error())
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(ConnectionError::Rpc(errors.join("; ")));
        }

        if reply.children.is_empty() {
            Ok(reply)
        } else {
            let content = reply.children.swap_remove(0);
            Ok(content.with_inherited_namespaces(&reply))
        }
    }

    fn json_reply(content: &XmlElement) -> ConnectionResult<Reply> {
        let text = content.text().unwrap_or_default();
        serde_json::from_str::<Value>(text)
            .map(Reply::Json)
            .map_err(|e| ConnectionError::ExecutionFailed(format!("malformed JSON reply: {}", e)))
    }
}

fn frame(element: &XmlElement) -> ConnectionResult<String> {
    let body = xml::to_text(element)
        .map_err(|e| ConnectionError::InvalidValue(e.to_string()))?;
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}{}",
        body, NETCONF_1_0_DELIMITER
    ))
}

fn parse_framed(response: &str) -> ConnectionResult<XmlElement> {
    let body = match response.find(NETCONF_1_0_DELIMITER) {
        Some(end) => &response[..end],
        None => response,
    };
    xml::parse(body.trim())
        .map_err(|e| ConnectionError::ExecutionFailed(format!("malformed NETCONF reply: {}", e)))
}

fn cli_format(format: Format) -> &'static str {
    match format {
        Format::Text | Format::Set => "text",
        Format::Json => "json",
        Format::Xml => "xml",
    }
}

/// Render a named RPC call as its request element.
fn rpc_element(call: &RpcCall) -> XmlElement {
    let mut element = XmlElement::new(call.method_name());
    for (key, value) in &call.kwargs {
        let key = key.replace('_', "-");
        match value {
            RpcValue::Str(format) if key == "format" => {
                element = element.with_attr("format", format.as_str());
            }
            RpcValue::Bool(true) => element = element.with_child(XmlElement::new(key)),
            RpcValue::Bool(false) => {}
            other => element = element.with_child(XmlElement::new(key).with_text(other.to_string())),
        }
    }
    element
}

fn requested_format(call: &RpcCall) -> Format {
    match call.get("format") {
        Some(RpcValue::Str(format)) => format.parse().unwrap_or_default(),
        _ => Format::Xml,
    }
}

#[async_trait]
impl Device for NetconfDevice {
    fn host(&self) -> &str {
        &self.inner.host
    }

    async fn close(&self) -> ConnectionResult<()> {
        if let Err(e) = self.send_rpc(XmlElement::new("close-session")).await {
            debug!(host = %self.inner.host, error = %e, "close-session failed");
        }
        self.inner.channel.close().await
    }

    async fn cli(&self, command: &str, format: Format) -> ConnectionResult<Reply> {
        let operation = XmlElement::new("command")
            .with_attr("format", cli_format(format))
            .with_text(command);
        let content = self.send_rpc(operation).await?;

        match format {
            Format::Xml => Ok(Reply::Xml(content)),
            Format::Json => Self::json_reply(&content),
            Format::Text | Format::Set => {
                let output = if content.name == "output" {
                    content.text().unwrap_or_default().to_string()
                } else {
                    content.find_text("output").unwrap_or_default().to_string()
                };
                Ok(Reply::Text(output))
            }
        }
    }

    async fn rpc(&self, call: &RpcCall) -> ConnectionResult<Reply> {
        let content = self.send_rpc(rpc_element(call)).await?;
        match requested_format(call) {
            Format::Json => Self::json_reply(&content),
            _ => Ok(Reply::Xml(content)),
        }
    }

    async fn facts_refresh(&self) -> ConnectionResult<()> {
        let content = self
            .send_rpc(XmlElement::new("get-software-information"))
            .await?;
        let info = if content.name == "software-information" {
            &content
        } else {
            content
                .find("multi-routing-engine-item/software-information")
                .unwrap_or(&content)
        };

        let mut facts = Facts::new();
        for (fact, path) in [
            ("hostname", "host-name"),
            ("model", "product-model"),
            ("version", "junos-version"),
        ] {
            if let Some(value) = info.find_text(path) {
                facts.insert(fact.to_string(), Value::String(value.to_string()));
            }
        }
        *self.inner.facts.write() = facts;
        Ok(())
    }

    fn facts(&self) -> Facts {
        self.inner.facts.read().clone()
    }

    fn config(&self) -> Box<dyn ConfigTransaction> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl ConfigTransaction for NetconfDevice {
    async fn lock(&self) -> ConnectionResult<()> {
        self.send_rpc(XmlElement::new("lock-configuration")).await?;
        Ok(())
    }

    async fn unlock(&self) -> ConnectionResult<()> {
        self.send_rpc(XmlElement::new("unlock-configuration")).await?;
        Ok(())
    }

    async fn load(&self, candidate: &str, options: &LoadOptions) -> ConnectionResult<()> {
        let action = if options.format == Format::Set {
            "set"
        } else if options.overwrite {
            "override"
        } else if options.merge {
            "merge"
        } else {
            "replace"
        };

        let payload = match options.format {
            Format::Text => XmlElement::new("configuration-text").with_text(candidate),
            Format::Set => XmlElement::new("configuration-set").with_text(candidate),
            Format::Json => XmlElement::new("configuration-json").with_text(candidate),
            Format::Xml => xml::parse(candidate)
                .map_err(|e| ConnectionError::InvalidValue(e.to_string()))?,
        };

        let operation = XmlElement::new("load-configuration")
            .with_attr("action", action)
            .with_attr("format", cli_format(options.format))
            .with_child(payload);
        self.send_rpc(operation).await?;
        Ok(())
    }

    async fn diff(&self) -> ConnectionResult<Option<String>> {
        let operation = XmlElement::new("get-configuration")
            .with_attr("compare", "rollback")
            .with_attr("rollback", "0")
            .with_attr("format", "text");
        let content = self.send_rpc(operation).await?;

        let output = if content.name == "configuration-output" {
            content.text()
        } else {
            content.find("configuration-output").and_then(|o| o.text())
        };
        Ok(output
            .filter(|diff| !diff.trim().is_empty())
            .map(str::to_string))
    }

    async fn commit_check(&self) -> ConnectionResult<bool> {
        let operation =
            XmlElement::new("commit-configuration").with_child(XmlElement::new("check"));
        match self.send_rpc(operation).await {
            Ok(_) => Ok(true),
            Err(ConnectionError::Rpc(message)) => {
                debug!(host = %self.inner.host, %message, "commit check rejected candidate");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn commit(&self, options: &CommitOptions) -> ConnectionResult<()> {
        let mut operation = XmlElement::new("commit-configuration");
        if let Some(ref comment) = options.comment {
            operation = operation.with_child(XmlElement::new("log").with_text(comment.as_str()));
        }
        if let Some(minutes) = options.confirm {
            operation = operation
                .with_child(XmlElement::new("confirmed"))
                .with_child(XmlElement::new("confirm-timeout").with_text(minutes.to_string()));
        }
        self.send_rpc(operation).await?;
        Ok(())
    }

    async fn rollback(&self, target: &RollbackTarget) -> ConnectionResult<()> {
        let operation = match *target {
            RollbackTarget::Index(n) if n > MAX_ROLLBACK_INDEX => {
                return Err(ConnectionError::InvalidValue(format!(
                    "rollback index {} out of range 0-{}",
                    n, MAX_ROLLBACK_INDEX
                )))
            }
            RollbackTarget::Index(n) => {
                XmlElement::new("load-configuration").with_attr("rollback", n.to_string())
            }
            RollbackTarget::Rescue => {
                XmlElement::new("load-configuration").with_attr("rescue", "rescue")
            }
        };
        self.send_rpc(operation).await?;
        Ok(())
    }
}
