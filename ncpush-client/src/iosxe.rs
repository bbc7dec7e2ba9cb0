//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Cisco IOS-XE specific operations.

use crate::error::{Error, Phase, Result};
use crate::rpc::Filter;
use crate::session::Session;
use crate::transport::Transport;

pub const CISCO_IA_NS: &str = "http://cisco.com/yang/cisco-ia";
pub const NATIVE_NS: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-native";

// Copies the running configuration to the startup configuration.
pub fn save_config<T: Transport>(session: &mut Session<T>) -> Result<()> {
    let body = format!(r#"<save-config xmlns="{}"/>"#, CISCO_IA_NS);
    session.rpc(&body)?.into_result(Phase::Rpc)?;
    Ok(())
}

// Builds an XPath filter for a path relative to the native configuration
// tree (e.g. "interface/GigabitEthernet").
pub fn native_xpath(path: &str) -> Result<Filter> {
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::InvalidFilter("empty path".to_owned()));
    }
    if path.starts_with('/') {
        return Err(Error::InvalidFilter(format!(
            "{}: path must be relative to /native",
            path
        )));
    }

    Ok(Filter::Xpath(format!("/native/{}", path)))
}

// ===== unit tests =====
