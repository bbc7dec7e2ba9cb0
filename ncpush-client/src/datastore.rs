//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Datastore that a transaction edits.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Candidate,
    Running,
}

// Datastore that configuration can be read from.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    #[default]
    Running,
    Candidate,
    Startup,
}

// ===== impl Target =====

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Candidate => "candidate",
            Target::Running => "running",
        }
    }

    // Whether edits land in a staging area that needs an explicit commit.
    pub fn needs_commit(&self) -> bool {
        matches!(self, Target::Candidate)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Target, String> {
        match s {
            "candidate" => Ok(Target::Candidate),
            "running" => Ok(Target::Running),
            _ => Err(format!("unknown target datastore: {}", s)),
        }
    }
}

impl From<Target> for Datastore {
    fn from(target: Target) -> Datastore {
        match target {
            Target::Candidate => Datastore::Candidate,
            Target::Running => Datastore::Running,
        }
    }
}

// ===== impl Datastore =====

impl Datastore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Startup => "startup",
        }
    }
}

impl std::fmt::Display for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Datastore {
    type Err = String;

    fn from_str(s: &str) -> Result<Datastore, String> {
        match s {
            "running" => Ok(Datastore::Running),
            "candidate" => Ok(Datastore::Candidate),
            "startup" => Ok(Datastore::Startup),
            _ => Err(format!("unknown datastore: {}", s)),
        }
    }
}
