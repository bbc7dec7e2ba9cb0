//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use derive_new::new;
use xml::ParserConfig;
use xml::reader::XmlEvent;

use crate::error::{Error, Result};
use crate::rpc::NETCONF_NS;

/// Serialized `edit-config` payload.
///
/// A payload is always rooted at a `config` element. It is validated for
/// well-formedness when built and is forwarded verbatim afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EditPayload(String);

/// Producer of the ordered payload list for one transaction.
///
/// Template engines and tree builders sit behind this trait; the pusher only
/// ever sees their canonical serialized output.
pub trait PayloadSource {
    fn payloads(&mut self) -> Result<Vec<EditPayload>>;
}

// Payloads read from XML files, in the given order.
#[derive(Debug, new)]
pub struct FileSource {
    paths: Vec<PathBuf>,
}

// ===== impl EditPayload =====

impl EditPayload {
    pub fn new(xml: impl AsRef<str>) -> Result<EditPayload> {
        let xml = xml.as_ref().trim();

        // Check well-formedness and find the root element.
        let reader = ParserConfig::new().create_reader(xml.as_bytes());
        let mut root = None;
        let mut depth = 0;
        for event in reader {
            match event.map_err(|error| Error::InvalidPayload(error.to_string()))?
            {
                XmlEvent::StartElement { name, .. } => {
                    if depth == 0 {
                        if root.is_some() {
                            return Err(Error::InvalidPayload(
                                "multiple root elements".to_owned(),
                            ));
                        }
                        root = Some(name.local_name);
                    }
                    depth += 1;
                }
                XmlEvent::EndElement { .. } => depth -= 1,
                _ => (),
            }
        }
        let Some(root) = root else {
            return Err(Error::InvalidPayload("empty document".to_owned()));
        };

        let body = strip_declaration(xml);
        let payload = if root == "config" {
            body.to_owned()
        } else {
            format!(r#"<config xmlns="{}">{}</config>"#, NETCONF_NS, body)
        };

        Ok(EditPayload(payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EditPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===== impl FileSource =====

impl PayloadSource for FileSource {
    fn payloads(&mut self) -> Result<Vec<EditPayload>> {
        self.paths
            .iter()
            .map(|path| {
                let xml = std::fs::read_to_string(path).map_err(|error| {
                    Error::InvalidPayload(format!(
                        "{}: {}",
                        path.display(),
                        error
                    ))
                })?;
                EditPayload::new(xml).map_err(|error| match error {
                    Error::InvalidPayload(error) => Error::InvalidPayload(
                        format!("{}: {}", path.display(), error),
                    ),
                    error => error,
                })
            })
            .collect()
    }
}

// ===== impl Vec<String> =====

impl PayloadSource for Vec<String> {
    fn payloads(&mut self) -> Result<Vec<EditPayload>> {
        self.iter().map(EditPayload::new).collect()
    }
}

// ===== impl Vec<EditPayload> =====

impl PayloadSource for Vec<EditPayload> {
    fn payloads(&mut self) -> Result<Vec<EditPayload>> {
        Ok(std::mem::take(self))
    }
}

// ===== helper functions =====

fn strip_declaration(xml: &str) -> &str {
    match xml.strip_prefix("<?xml").and_then(|rest| rest.split_once("?>")) {
        Some((_, body)) => body.trim_start(),
        None => xml,
    }
}

// ===== unit tests =====
