//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use enum_as_inner::EnumAsInner;
use serde::Serialize;
use xml::ParserConfig;
use xml::escape::escape_str_attribute;
use xml::reader::XmlEvent;
use xml::writer::{EmitterConfig, EventWriter};

use crate::capabilities::{self, Capabilities};
use crate::datastore::{Datastore, Target};
use crate::error::{Error, Phase, Result};
use crate::payload::EditPayload;

// NETCONF base namespace.
pub const NETCONF_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

// NETCONF operations issued by the pusher.
#[derive(Debug)]
pub enum Rpc<'a> {
    Lock(Target),
    Unlock(Target),
    EditConfig(Target, &'a EditPayload),
    DiscardChanges,
    Commit,
    GetConfig(Datastore, Option<&'a Filter>),
    Raw(&'a str),
    CloseSession,
}

// Selection filter for retrieval operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    Subtree(String),
    Xpath(String),
}

// Decoded server hello.
#[derive(Debug, new)]
pub struct Hello {
    pub capabilities: Capabilities,
    pub session_id: Option<u32>,
}

// Decoded rpc-reply.
#[derive(Clone, Debug, Eq, PartialEq, EnumAsInner)]
pub enum RpcReply {
    Ok,
    Data(String),
    Errors(Vec<RpcError>),
}

// A single rpc-error element (RFC 6241, section 4.3).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Serialize)]
pub struct RpcError {
    pub error_type: String,
    pub tag: String,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ===== impl Rpc =====

impl Rpc<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Rpc::Lock(..) => "lock",
            Rpc::Unlock(..) => "unlock",
            Rpc::EditConfig(..) => "edit-config",
            Rpc::DiscardChanges => "discard-changes",
            Rpc::Commit => "commit",
            Rpc::GetConfig(..) => "get-config",
            Rpc::Raw(..) => "rpc",
            Rpc::CloseSession => "close-session",
        }
    }

    // Builds the complete rpc document for the given message-id.
    pub fn encode(&self, message_id: u64) -> String {
        let body = match self {
            Rpc::Lock(target) => {
                format!("<lock><target><{}/></target></lock>", target)
            }
            Rpc::Unlock(target) => {
                format!("<unlock><target><{}/></target></unlock>", target)
            }
            Rpc::EditConfig(target, payload) => format!(
                "<edit-config><target><{}/></target>{}</edit-config>",
                target,
                payload.as_str()
            ),
            Rpc::DiscardChanges => "<discard-changes/>".to_owned(),
            Rpc::Commit => "<commit/>".to_owned(),
            Rpc::GetConfig(source, filter) => {
                let filter = filter.map(Filter::encode).unwrap_or_default();
                format!(
                    "<get-config><source><{}/></source>{}</get-config>",
                    source, filter
                )
            }
            Rpc::Raw(body) => (*body).to_owned(),
            Rpc::CloseSession => "<close-session/>".to_owned(),
        };

        format!(
            r#"{}<rpc message-id="{}" xmlns="{}">{}</rpc>"#,
            XML_DECLARATION, message_id, NETCONF_NS, body
        )
    }
}

// ===== impl Filter =====

impl Filter {
    fn encode(&self) -> String {
        match self {
            Filter::Subtree(subtree) => {
                format!(r#"<filter type="subtree">{}</filter>"#, subtree)
            }
            Filter::Xpath(select) => format!(
                r#"<filter type="xpath" select="{}"/>"#,
                escape_str_attribute(select)
            ),
        }
    }
}

// ===== impl Hello =====

impl Hello {
    // Client hello; only the base:1.0 framing is advertised.
    pub fn encode_client() -> String {
        format!(
            r#"{}<hello xmlns="{}"><capabilities><capability>{}</capability></capabilities></hello>"#,
            XML_DECLARATION,
            NETCONF_NS,
            capabilities::BASE_1_0
        )
    }

    pub fn decode(xml: &str) -> std::result::Result<Hello, String> {
        let reader = ParserConfig::new()
            .trim_whitespace(true)
            .create_reader(xml.as_bytes());

        let mut stack: Vec<String> = vec![];
        let mut uris = vec![];
        let mut session_id = None;
        for event in reader {
            match event.map_err(|error| error.to_string())? {
                XmlEvent::StartElement { name, .. } => {
                    if stack.is_empty() && name.local_name != "hello" {
                        return Err(format!(
                            "unexpected root element: {}",
                            name.local_name
                        ));
                    }
                    stack.push(name.local_name);
                }
                XmlEvent::EndElement { .. } => {
                    stack.pop();
                }
                XmlEvent::Characters(text) => {
                    match stack.last().map(String::as_str) {
                        Some("capability") => uris.push(text.trim().to_owned()),
                        Some("session-id") => {
                            let id = text.trim().parse::<u32>().map_err(
                                |error| format!("invalid session-id: {}", error),
                            )?;
                            session_id = Some(id);
                        }
                        _ => (),
                    }
                }
                _ => (),
            }
        }

        if uris.is_empty() {
            return Err("no capabilities advertised".to_owned());
        }

        Ok(Hello::new(Capabilities::new(uris), session_id))
    }
}

// ===== impl RpcReply =====

impl RpcReply {
    // Decodes an rpc-reply document.
    //
    // Replies carrying only warning-severity errors are not failures: they
    // decode to the reply's actual content.
    pub fn decode(xml: &str) -> std::result::Result<RpcReply, String> {
        RpcReply::decode_with_id(xml).map(|(_, reply)| reply)
    }

    // Decodes an rpc-reply document along with its message-id attribute.
    pub fn decode_with_id(
        xml: &str,
    ) -> std::result::Result<(Option<u64>, RpcReply), String> {
        let reader = ParserConfig::new()
            .trim_whitespace(true)
            .create_reader(xml.as_bytes());

        let mut message_id = None;
        let mut depth = 0;
        let mut ok = false;
        let mut errors = vec![];
        let mut error: Option<RpcError> = None;
        let mut field: Option<String> = None;
        let mut data: Option<String> = None;
        let mut data_writer: Option<EventWriter<Vec<u8>>> = None;

        for event in reader {
            let event = event.map_err(|error| error.to_string())?;

            // Re-emit everything nested inside the <data> element.
            if let Some(mut writer) = data_writer.take() {
                match &event {
                    XmlEvent::StartElement { .. } => depth += 1,
                    XmlEvent::EndElement { .. } if depth == 2 => {
                        depth -= 1;
                        let inner = String::from_utf8(writer.into_inner())
                            .map_err(|error| error.to_string())?;
                        data = Some(inner);
                        continue;
                    }
                    XmlEvent::EndElement { .. } => depth -= 1,
                    _ => (),
                }
                if let Some(event) = event.as_writer_event() {
                    writer.write(event).map_err(|error| error.to_string())?;
                }
                data_writer = Some(writer);
                continue;
            }

            match event {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    depth += 1;
                    match (depth, name.local_name.as_str()) {
                        (1, "rpc-reply") => {
                            message_id = attributes
                                .iter()
                                .find(|attr| attr.name.local_name == "message-id")
                                .map(|attr| {
                                    attr.value.trim().parse::<u64>().map_err(
                                        |error| {
                                            format!(
                                                "invalid message-id: {}",
                                                error
                                            )
                                        },
                                    )
                                })
                                .transpose()?;
                        }
                        (1, other) => {
                            return Err(format!(
                                "unexpected root element: {}",
                                other
                            ));
                        }
                        (2, "ok") => ok = true,
                        (2, "data") => {
                            data = Some(String::new());
                            data_writer = Some(
                                EmitterConfig::new()
                                    .write_document_declaration(false)
                                    .create_writer(Vec::new()),
                            );
                        }
                        (2, "rpc-error") => error = Some(RpcError::default()),
                        (3, _) if error.is_some() => {
                            field = Some(name.local_name);
                        }
                        _ => (),
                    }
                }
                XmlEvent::EndElement { name } => {
                    if depth == 2 && name.local_name == "rpc-error" {
                        errors.extend(error.take());
                    }
                    if depth == 3 {
                        field = None;
                    }
                    depth -= 1;
                }
                XmlEvent::Characters(text) | XmlEvent::CData(text) => {
                    if let (Some(error), Some(field)) = (&mut error, &field) {
                        error.set_field(field, text.trim());
                    }
                }
                _ => (),
            }
        }

        let reply = if errors.iter().any(RpcError::is_error) {
            RpcReply::Errors(errors)
        } else if let Some(data) = data {
            RpcReply::Data(data)
        } else if ok || !errors.is_empty() {
            RpcReply::Ok
        } else {
            return Err(
                "reply carries neither <ok/>, <data> nor <rpc-error>".to_owned()
            );
        };
        Ok((message_id, reply))
    }

    // Converts an error reply into an error for the given phase.
    pub fn into_result(self, phase: Phase) -> Result<RpcReply> {
        match self {
            RpcReply::Errors(errors) => Err(Error::RpcFailed(phase, errors)),
            reply => Ok(reply),
        }
    }
}

// ===== impl RpcError =====

impl RpcError {
    // Whether this error makes the request fail (as opposed to a warning).
    pub fn is_error(&self) -> bool {
        self.severity != "warning"
    }

    // Whether the device refused a lock because another session holds it.
    pub fn is_lock_denied(&self) -> bool {
        matches!(self.tag.as_str(), "lock-denied" | "in-use")
    }

    // Whether the request itself could not be parsed, as opposed to being
    // well-formed but semantically invalid.
    pub fn is_malformed(&self) -> bool {
        self.tag == "malformed-message" || self.error_type == "rpc"
    }

    fn set_field(&mut self, field: &str, value: &str) {
        let value = value.to_owned();
        match field {
            "error-type" => self.error_type = value,
            "error-tag" => self.tag = value,
            "error-severity" => self.severity = value,
            "error-app-tag" => self.app_tag = Some(value),
            "error-path" => self.path = Some(value),
            "error-message" => self.message = Some(value),
            // error-info is not interpreted.
            _ => (),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.error_type, self.tag)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path {})", path)?;
        }
        Ok(())
    }
}

// ===== unit tests =====
