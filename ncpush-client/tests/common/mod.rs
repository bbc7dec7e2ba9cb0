//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use ncpush_client::capabilities;
use ncpush_client::iosxe::NATIVE_NS;
use ncpush_client::rpc::NETCONF_NS;
use ncpush_client::{EditPayload, Session, Transport, TransportError};

// Marker that makes the stub device reject an edit as semantically invalid.
pub const INVALID: &str = "INVALID";
// Marker that makes the stub device reject an edit as unparsable.
pub const MALFORMED: &str = "MALFORMED";

// Instrumented NETCONF device.
//
// The device is shared between the test and the transport handed to the
// code under test, so that its state can be inspected afterwards.
#[derive(Clone, Debug, Default)]
pub struct StubDevice(Arc<Mutex<DeviceState>>);

#[derive(Debug, Default)]
pub struct DeviceState {
    pub capabilities: Vec<String>,
    pub session_id: u32,
    // Operation names of every received RPC, in order.
    pub rpcs: Vec<String>,
    // Datastore contents, as lists of accepted payloads.
    pub candidate: Vec<String>,
    pub running: Vec<String>,
    pub locked: Option<String>,
    pub lock_count: usize,
    pub unlock_count: usize,
    pub edit_count: usize,
    pub closed: bool,
    // Fault injection.
    pub deny_lock: usize,
    pub fail_unlock: bool,
    pub reject_commit: bool,
    pub timeout_on_edit: Option<usize>,
    // Name of an operation whose next reply is never sent.
    pub timeout_on_rpc: Option<String>,
    // Index of an edit whose reply is sent only after the next request.
    pub delay_edit: Option<usize>,
    // Added to the message-id of every reply.
    pub message_id_skew: u64,
    pub config_data: String,
    late: Option<String>,
}

#[derive(Debug)]
pub struct StubTransport {
    device: StubDevice,
    replies: VecDeque<String>,
}

// ===== impl StubDevice =====

impl StubDevice {
    pub fn new(capabilities: &[&str]) -> StubDevice {
        let state = DeviceState {
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            session_id: 42,
            ..Default::default()
        };
        StubDevice(Arc::new(Mutex::new(state)))
    }

    // Device advertising both editable datastores, like IOS-XE with
    // candidate support enabled.
    pub fn candidate() -> StubDevice {
        StubDevice::new(&[
            capabilities::BASE_1_0,
            capabilities::BASE_1_1,
            capabilities::CANDIDATE,
            capabilities::WRITABLE_RUNNING,
            capabilities::XPATH,
        ])
    }

    pub fn running() -> StubDevice {
        StubDevice::new(&[
            capabilities::BASE_1_0,
            capabilities::WRITABLE_RUNNING,
        ])
    }

    pub fn transport(&self) -> StubTransport {
        StubTransport {
            device: self.clone(),
            replies: VecDeque::new(),
        }
    }

    pub fn session(&self) -> Session<StubTransport> {
        Session::open("stub", self.transport()).unwrap()
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.0.lock().unwrap()
    }

    // Returns the received RPCs, excluding session termination.
    pub fn rpcs(&self) -> Vec<String> {
        self.state()
            .rpcs
            .iter()
            .filter(|rpc| *rpc != "close-session")
            .cloned()
            .collect()
    }
}

// ===== impl DeviceState =====

impl DeviceState {
    fn process(&mut self, message: &str) -> Option<String> {
        if message.contains("<hello") {
            return Some(self.hello());
        }

        let message_id = attribute(message, "message-id")
            .and_then(|id| id.parse::<u64>().ok())
            .unwrap_or(0)
            + self.message_id_skew;
        let operation = operation(message);
        self.rpcs.push(operation.clone());
        if self.timeout_on_rpc.as_ref() == Some(&operation) {
            self.timeout_on_rpc = None;
            return None;
        }

        let reply = match operation.as_str() {
            "lock" => {
                if self.deny_lock > 0 || self.locked.is_some() {
                    self.deny_lock = self.deny_lock.saturating_sub(1);
                    Reply::Error("protocol", "lock-denied", "lock is held")
                } else {
                    self.lock_count += 1;
                    self.locked = Some(datastore(message).to_owned());
                    Reply::Ok
                }
            }
            "unlock" => {
                self.unlock_count += 1;
                if self.fail_unlock {
                    Reply::Error("protocol", "operation-failed", "unlock failed")
                } else {
                    self.locked = None;
                    Reply::Ok
                }
            }
            "edit-config" => {
                let index = self.edit_count;
                self.edit_count += 1;
                if self.timeout_on_edit == Some(index) {
                    return None;
                }
                let reply = if message.contains(MALFORMED) {
                    Reply::Error("rpc", "malformed-message", "parse error")
                } else if message.contains(INVALID) {
                    Reply::Error("application", "invalid-value", "bad value")
                } else {
                    match datastore(message) {
                        "candidate" => self.candidate.push(message.to_owned()),
                        _ => self.running.push(message.to_owned()),
                    }
                    Reply::Ok
                };
                if self.delay_edit == Some(index) {
                    self.late = Some(reply.encode(message_id));
                    return None;
                }
                reply
            }
            "commit" => {
                if self.reject_commit {
                    Reply::Error(
                        "application",
                        "operation-failed",
                        "commit validation failed",
                    )
                } else {
                    self.running.append(&mut self.candidate);
                    Reply::Ok
                }
            }
            "discard-changes" => {
                self.candidate.clear();
                Reply::Ok
            }
            "get-config" => Reply::Data(self.config_data.clone()),
            _ => Reply::Ok,
        };

        Some(reply.encode(message_id))
    }

    fn hello(&self) -> String {
        let capabilities: String = self
            .capabilities
            .iter()
            .map(|uri| format!("<capability>{}</capability>", uri))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><hello xmlns="{}"><capabilities>{}</capabilities><session-id>{}</session-id></hello>"#,
            NETCONF_NS, capabilities, self.session_id
        )
    }
}

// ===== impl StubTransport =====

impl Transport for StubTransport {
    fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let mut state = self.device.state();
        if state.closed {
            return Err(TransportError::Closed);
        }
        // A delayed reply is received ahead of the reply to this request.
        let late = state.late.take();
        let reply = state.process(message);
        self.replies.extend(late);
        self.replies.extend(reply);
        Ok(())
    }

    fn recv(&mut self) -> Result<String, TransportError> {
        if self.device.state().closed {
            return Err(TransportError::Closed);
        }
        self.replies.pop_front().ok_or(TransportError::Timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.device.state().closed = true;
        Ok(())
    }
}

// ===== helper functions =====

enum Reply<'a> {
    Ok,
    Data(String),
    Error(&'a str, &'a str, &'a str),
}

impl Reply<'_> {
    fn encode(&self, message_id: u64) -> String {
        let body = match self {
            Reply::Ok => "<ok/>".to_owned(),
            Reply::Data(data) => format!("<data>{}</data>", data),
            Reply::Error(error_type, tag, message) => format!(
                "<rpc-error><error-type>{}</error-type><error-tag>{}</error-tag><error-severity>error</error-severity><error-message>{}</error-message></rpc-error>",
                error_type, tag, message
            ),
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rpc-reply message-id="{}" xmlns="{}">{}</rpc-reply>"#,
            message_id, NETCONF_NS, body
        )
    }
}

fn attribute<'a>(message: &'a str, name: &str) -> Option<&'a str> {
    let start = message.find(&format!(r#"{}=""#, name))? + name.len() + 2;
    let len = message[start..].find('"')?;
    Some(&message[start..start + len])
}

// Name of the first element nested in <rpc>.
fn operation(message: &str) -> String {
    let rpc = message.find("<rpc ").unwrap_or(0);
    let body = &message[rpc..];
    let start = body.find('>').map(|pos| pos + 2).unwrap_or(0);
    body[start..]
        .chars()
        .take_while(|c| !matches!(c, ' ' | '/' | '>'))
        .collect()
}

fn datastore(message: &str) -> &'static str {
    if message.contains("<target><candidate/></target>") {
        "candidate"
    } else {
        "running"
    }
}

// ===== payload helpers =====

pub fn hostname(name: &str) -> EditPayload {
    EditPayload::new(format!(
        r#"<native xmlns="{}"><hostname>{}</hostname></native>"#,
        NATIVE_NS, name
    ))
    .unwrap()
}

pub fn interface(name: &str, description: &str) -> EditPayload {
    EditPayload::new(format!(
        r#"<native xmlns="{}"><interface><GigabitEthernet><name>{}</name><description>{}</description></GigabitEthernet></interface></native>"#,
        NATIVE_NS, name, description
    ))
    .unwrap()
}
