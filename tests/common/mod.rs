//! Shared test utilities for the session test suites.
//!
//! This module provides:
//! - A recording mock RPC device (`MockConnector`, `MockDevice`, `MockConfig`)
//! - A scripted NETCONF channel behind the real `NetconfDevice` (`ScriptedNetconf`)
//! - A scripted mock interactive shell (`MockShellConnector`, `MockShell`)
//! - Parameter fixtures
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use rustible_junos::config::ConnectionParams;
use rustible_junos::connection::{
    CommitOptions, ConfigTransaction, ConnectionError, ConnectionResult, Device, DeviceConnector,
    DeviceTarget, Facts, LoadOptions, NetconfChannel, NetconfDevice, Reply, RollbackTarget,
    ShellChannel, ShellConnector,
};
use rustible_junos::network::{Format, RpcCall, XmlElement};

// ============================================================================
// Fixtures
// ============================================================================

pub fn params() -> ConnectionParams {
    ConnectionParams::new("r1", "admin").with_password("secret")
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Mock RPC Device
// ============================================================================

/// State shared by the connector, the device and its configuration handle.
///
/// Every primitive call is appended to `calls` by name (`lock`, `load`,
/// `cli:<command>`, `rpc:<name>`, ...). Adding an operation name to the
/// failure set makes that primitive return an RPC error.
#[derive(Default)]
pub struct MockState {
    calls: RwLock<Vec<String>>,
    failures: RwLock<HashSet<String>>,
    diff: RwLock<Option<String>>,
    check_fails: AtomicBool,
    cli_replies: RwLock<HashMap<String, Reply>>,
    rpc_replies: RwLock<HashMap<String, Reply>>,
    facts: RwLock<Facts>,
    pub last_rpc: RwLock<Option<RpcCall>>,
    pub last_load: RwLock<Option<(String, LoadOptions)>>,
    pub last_commit: RwLock<Option<CommitOptions>>,
    pub last_rollback: RwLock<Option<RollbackTarget>>,
    pub last_cli_format: RwLock<Option<Format>>,
}

impl MockState {
    fn record(&self, call: impl Into<String>) {
        self.calls.write().push(call.into());
    }

    fn check(&self, operation: &str) -> ConnectionResult<()> {
        if self.failures.read().contains(operation) {
            Err(ConnectionError::Rpc(format!("{} rejected by device", operation)))
        } else {
            Ok(())
        }
    }

    fn call(&self, operation: &str) -> ConnectionResult<()> {
        self.record(operation);
        self.check(operation)
    }
}

/// Opens [`MockDevice`] sessions over a shared [`MockState`].
pub struct MockConnector {
    pub state: Arc<MockState>,
    fail_open: AtomicBool,
    opened: AtomicU32,
    last_target: RwLock<Option<DeviceTarget>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(MockState::default()),
            fail_open: AtomicBool::new(false),
            opened: AtomicU32::new(0),
            last_target: RwLock::new(None),
        })
    }

    /// Make the named primitive fail (`lock`, `load`, `diff`, `commit`, ...).
    pub fn fail_on(&self, operation: &str) {
        self.state.failures.write().insert(operation.to_string());
    }

    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn set_diff(&self, diff: Option<&str>) {
        *self.state.diff.write() = diff.map(str::to_string);
    }

    pub fn set_check_fails(&self) {
        self.state.check_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_cli_reply(&self, command: &str, reply: Reply) {
        self.state
            .cli_replies
            .write()
            .insert(command.to_string(), reply);
    }

    pub fn set_rpc_reply(&self, name: &str, reply: Reply) {
        self.state.rpc_replies.write().insert(name.to_string(), reply);
    }

    pub fn set_fact(&self, key: &str, value: &str) {
        self.state
            .facts
            .write()
            .insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.read().clone()
    }

    pub fn called(&self, operation: &str) -> bool {
        self.state.calls.read().iter().any(|c| c == operation)
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .calls
            .read()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn open_count(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn last_target(&self) -> Option<DeviceTarget> {
        self.last_target.read().clone()
    }
}

#[async_trait]
impl DeviceConnector for MockConnector {
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Arc<dyn Device>> {
        *self.last_target.write() = Some(target.clone());
        self.state.record("open");
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectionFailed(
                "connection refused".to_string(),
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockDevice {
            host: target.host.clone(),
            state: self.state.clone(),
        }))
    }
}

pub struct MockDevice {
    host: String,
    state: Arc<MockState>,
}

#[async_trait]
impl Device for MockDevice {
    fn host(&self) -> &str {
        &self.host
    }

    async fn close(&self) -> ConnectionResult<()> {
        self.state.call("close")
    }

    async fn cli(&self, command: &str, format: Format) -> ConnectionResult<Reply> {
        self.state.record(format!("cli:{}", command));
        self.state.check("cli")?;
        *self.state.last_cli_format.write() = Some(format);
        Ok(self
            .state
            .cli_replies
            .read()
            .get(command)
            .cloned()
            .unwrap_or_else(|| Reply::Xml(XmlElement::new("output").with_text(command))))
    }

    async fn rpc(&self, call: &RpcCall) -> ConnectionResult<Reply> {
        self.state.record(format!("rpc:{}", call.name));
        self.state.check("rpc")?;
        *self.state.last_rpc.write() = Some(call.clone());
        Ok(self
            .state
            .rpc_replies
            .read()
            .get(&call.name)
            .cloned()
            .unwrap_or_else(|| Reply::Xml(XmlElement::new(call.method_name()))))
    }

    async fn facts_refresh(&self) -> ConnectionResult<()> {
        self.state.call("facts_refresh")
    }

    fn facts(&self) -> Facts {
        self.state.facts.read().clone()
    }

    fn config(&self) -> Box<dyn ConfigTransaction> {
        Box::new(MockConfig {
            state: self.state.clone(),
        })
    }
}

pub struct MockConfig {
    state: Arc<MockState>,
}

#[async_trait]
impl ConfigTransaction for MockConfig {
    async fn lock(&self) -> ConnectionResult<()> {
        self.state.call("lock")
    }

    async fn unlock(&self) -> ConnectionResult<()> {
        self.state.call("unlock")
    }

    async fn load(&self, candidate: &str, options: &LoadOptions) -> ConnectionResult<()> {
        self.state.call("load")?;
        *self.state.last_load.write() = Some((candidate.to_string(), *options));
        Ok(())
    }

    async fn diff(&self) -> ConnectionResult<Option<String>> {
        self.state.call("diff")?;
        Ok(self.state.diff.read().clone())
    }

    async fn commit_check(&self) -> ConnectionResult<bool> {
        self.state.call("commit_check")?;
        Ok(!self.state.check_fails.load(Ordering::SeqCst))
    }

    async fn commit(&self, options: &CommitOptions) -> ConnectionResult<()> {
        self.state.call("commit")?;
        *self.state.last_commit.write() = Some(options.clone());
        Ok(())
    }

    async fn rollback(&self, target: &RollbackTarget) -> ConnectionResult<()> {
        *self.state.last_rollback.write() = Some(*target);
        self.state.call("rollback")
    }
}

// ============================================================================
// Scripted NETCONF Device
// ============================================================================

/// Junos-shaped reply to `show system uptime` in XML.
pub const UPTIME_REPLY: &str = r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:junos="http://xml.juniper.net/junos/21.4R3/junos">
<system-uptime-information xmlns="http://xml.juniper.net/junos/21.4R3/junos">
<current-time>
<date-time junos:seconds="1704067200">2024-01-01 00:00:00 UTC</date-time>
</current-time>
<uptime-information>
<up-time junos:seconds="262800">3 days, 1:00</up-time>
</uptime-information>
</system-uptime-information>
</rpc-reply>
]]>]]>"#;

/// Answers each NETCONF exchange with the next scripted reply.
pub struct ScriptedNetconf {
    replies: parking_lot::Mutex<VecDeque<String>>,
    pub sent: Arc<parking_lot::Mutex<Vec<String>>>,
}

#[async_trait]
impl NetconfChannel for ScriptedNetconf {
    async fn exchange(&self, message: &str) -> ConnectionResult<String> {
        self.sent.lock().push(message.to_string());
        self.replies
            .lock()
            .pop_front()
            .ok_or(ConnectionError::ConnectionClosed)
    }

    async fn close(&self) -> ConnectionResult<()> {
        Ok(())
    }
}

/// Opens a [`NetconfDevice`] over a [`ScriptedNetconf`] channel.
pub struct NetconfConnector {
    replies: Vec<String>,
    pub sent: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl NetconfConnector {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            sent: Arc::new(parking_lot::Mutex::new(Vec::new())),
        })
    }
}

#[async_trait]
impl DeviceConnector for NetconfConnector {
    async fn open(&self, target: &DeviceTarget) -> ConnectionResult<Arc<dyn Device>> {
        let channel = ScriptedNetconf {
            replies: parking_lot::Mutex::new(self.replies.iter().cloned().collect()),
            sent: self.sent.clone(),
        };
        Ok(Arc::new(NetconfDevice::new(target.host.clone(), channel)))
    }
}

// ============================================================================
// Mock Interactive Shell
// ============================================================================

/// Scripted device behaviour shared by every shell the connector opens.
pub struct ShellScript {
    banner: String,
    prompt: RwLock<String>,
    outputs: RwLock<HashMap<String, String>>,
    written: RwLock<Vec<String>>,
    closed: AtomicBool,
}

impl ShellScript {
    pub fn written(&self) -> Vec<String> {
        self.written.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Commands as the device received them, without the line terminator
    pub fn commands(&self) -> Vec<String> {
        self.written
            .read()
            .iter()
            .map(|w| w.trim_end_matches('\r').to_string())
            .collect()
    }
}

pub struct MockShellConnector {
    pub script: Arc<ShellScript>,
    fail_open: AtomicBool,
}

impl MockShellConnector {
    /// A device that greets with `prompt` (e.g. `admin@r1> `).
    pub fn new(prompt: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(ShellScript {
                banner: "--- JUNOS 21.4R3.15 Kernel 64-bit\r\n".to_string(),
                prompt: RwLock::new(prompt.to_string()),
                outputs: RwLock::new(HashMap::new()),
                written: RwLock::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            fail_open: AtomicBool::new(false),
        })
    }

    pub fn set_output(&self, command: &str, output: &str) {
        self.script
            .outputs
            .write()
            .insert(command.to_string(), output.to_string());
    }

    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShellConnector for MockShellConnector {
    async fn open(&self, _target: &DeviceTarget) -> ConnectionResult<Box<dyn ShellChannel>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(ConnectionError::AuthenticationFailed(
                "permission denied".to_string(),
            ));
        }
        let greeting = format!("{}{}", self.script.banner, self.script.prompt.read());
        Ok(Box::new(MockShell {
            script: self.script.clone(),
            pending: VecDeque::from([greeting]),
        }))
    }
}

/// Echoes each command, prints its scripted output, then the prompt.
pub struct MockShell {
    script: Arc<ShellScript>,
    pending: VecDeque<String>,
}

#[async_trait]
impl ShellChannel for MockShell {
    async fn write(&mut self, data: &str) -> ConnectionResult<()> {
        self.script.written.write().push(data.to_string());
        let command = data.trim_end_matches('\r');

        if command == "configure" {
            *self.script.prompt.write() = "[edit]\r\nadmin@r1# ".to_string();
        } else if command.starts_with("commit and-quit") || command == "cli" {
            *self.script.prompt.write() = "admin@r1> ".to_string();
        }

        let output = self
            .script
            .outputs
            .read()
            .get(command)
            .cloned()
            .unwrap_or_default();
        let mut response = format!("{}\r\n", command);
        if !output.is_empty() {
            response.push_str(&output.replace('\n', "\r\n"));
            response.push_str("\r\n");
        }
        response.push_str(&self.script.prompt.read());
        self.pending.push_back(response);
        Ok(())
    }

    async fn read(&mut self) -> ConnectionResult<Option<String>> {
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> ConnectionResult<()> {
        self.script.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
