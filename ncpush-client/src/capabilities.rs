//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use serde::Serialize;

use crate::datastore::Target;
use crate::error::{Error, Result};

//
// Standard capability identifiers (RFC 6241, section 8).
//
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";
pub const CANDIDATE: &str = "urn:ietf:params:netconf:capability:candidate:1.0";
pub const WRITABLE_RUNNING: &str =
    "urn:ietf:params:netconf:capability:writable-running:1.0";
pub const STARTUP: &str = "urn:ietf:params:netconf:capability:startup:1.0";
pub const XPATH: &str = "urn:ietf:params:netconf:capability:xpath:1.0";

const CAPABILITY_PREFIX: &str = "urn:ietf:params:netconf:capability:";

// Capability set advertised by the device in its hello message.
//
// The set is fixed for the lifetime of a session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Serialize)]
pub struct Capabilities(BTreeSet<String>);

// ===== impl Capabilities =====

impl Capabilities {
    pub fn new<I, S>(uris: I) -> Capabilities
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Capabilities(uris.into_iter().map(Into::into).collect())
    }

    // Checks for a capability by URI or by short name (e.g. ":candidate").
    //
    // URI parameters (anything after '?') are ignored.
    pub fn contains(&self, capability: &str) -> bool {
        match capability.strip_prefix(':') {
            Some(short) => self
                .0
                .iter()
                .any(|uri| short_name(uri) == Some(short)),
            None => self.0.iter().any(|uri| strip_params(uri) == capability),
        }
    }

    // Returns whether the given datastore can be the target of edits.
    pub fn supports(&self, target: Target) -> bool {
        match target {
            Target::Candidate => self.contains(":candidate"),
            Target::Running => self.contains(":writable-running"),
        }
    }

    // Selects the datastore to edit.
    //
    // Candidate is preferred as it supports atomic commit and rollback.
    pub fn select_target(&self) -> Result<Target> {
        [Target::Candidate, Target::Running]
            .into_iter()
            .find(|target| self.supports(*target))
            .ok_or(Error::NoEditableDatastore)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ===== helper functions =====

fn strip_params(uri: &str) -> &str {
    uri.split_once('?').map_or(uri, |(uri, _)| uri)
}

// "urn:ietf:params:netconf:capability:candidate:1.0" -> "candidate"
fn short_name(uri: &str) -> Option<&str> {
    strip_params(uri)
        .strip_prefix(CAPABILITY_PREFIX)
        .and_then(|name| name.split(':').next())
}

// ===== unit tests =====
