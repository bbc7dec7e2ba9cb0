//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use itertools::Itertools;
use serde::Serialize;
use tracing::{error, warn};

use crate::datastore::Target;
use crate::rpc::RpcError;
use crate::transaction::{EditRejection, TransactionReport};
use crate::transport::TransportError;

//
// Type aliases.
//
pub type Result<T> = std::result::Result<T, Error>;

// Workflow phase in which a network round-trip took place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Capabilities,
    Lock,
    Edit,
    Finalize,
    Unlock,
    Rpc,
    Close,
}

//
// Pusher errors.
//
#[derive(Debug)]
pub enum Error {
    // Session establishment
    Connect(String),
    HostKey(String),
    Authentication(String),
    NotConnected,
    // Capability negotiation
    NoEditableDatastore,
    TargetNotSupported(Target),
    XpathNotSupported,
    // Locking
    LockContention(Target, Vec<RpcError>),
    AlreadyLocked(Target),
    UnlockFailed {
        error: Box<Error>,
        prior: Option<Box<Error>>,
        report: Option<Box<TransactionReport>>,
    },
    // Transaction interrupted after edits were submitted
    Aborted {
        error: Box<Error>,
        report: Box<TransactionReport>,
    },
    // RPC exchange
    EditRejected(EditRejection),
    RpcFailed(Phase, Vec<RpcError>),
    InvalidReply(Phase, String),
    TransportTimeout(Phase),
    Transport(Phase, TransportError),
    // Input
    InvalidPayload(String),
    InvalidFilter(String),
}

// ===== impl Phase =====

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Capabilities => write!(f, "capability-query"),
            Phase::Lock => write!(f, "lock"),
            Phase::Edit => write!(f, "edit"),
            Phase::Finalize => write!(f, "finalize"),
            Phase::Unlock => write!(f, "unlock"),
            Phase::Rpc => write!(f, "rpc"),
            Phase::Close => write!(f, "close"),
        }
    }
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::UnlockFailed { error, prior, .. } => {
                // The device is possibly left locked.
                match prior {
                    Some(prior) => {
                        error!(%error, %prior, "{}", self);
                    }
                    None => {
                        error!(%error, "{}", self);
                    }
                }
            }
            Error::Aborted { error, report } => {
                error!(
                    %error,
                    outcome = %report.outcome,
                    submitted = report.results.len(),
                    "{}",
                    self
                );
            }
            Error::TransportTimeout(phase) => {
                warn!(%phase, "{}", self);
            }
            Error::Transport(phase, error) => {
                warn!(%phase, %error, "{}", self);
            }
            Error::RpcFailed(phase, errors) => {
                let errors = format_rpc_errors(errors);
                warn!(%phase, %errors, "{}", self);
            }
            _ => warn!("{}", self),
        }
    }

    // Returns whether the same request may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockContention(..))
    }

    // Returns the phase in which a network error occurred, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::RpcFailed(phase, _)
            | Error::InvalidReply(phase, _)
            | Error::TransportTimeout(phase)
            | Error::Transport(phase, _) => Some(*phase),
            Error::LockContention(..) => Some(Phase::Lock),
            Error::UnlockFailed { .. } => Some(Phase::Unlock),
            Error::Aborted { error, .. } => error.phase(),
            Error::EditRejected(..) => Some(Phase::Edit),
            _ => None,
        }
    }

    // Returns the per-edit results gathered before the error, if any.
    pub fn report(&self) -> Option<&TransactionReport> {
        match self {
            Error::UnlockFailed { report, .. } => report.as_deref(),
            Error::Aborted { report, .. } => Some(&**report),
            _ => None,
        }
    }

    pub(crate) fn transport(phase: Phase, error: TransportError) -> Error {
        match error {
            TransportError::Timeout => Error::TransportTimeout(phase),
            error => Error::Transport(phase, error),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Connect(error) => {
                write!(f, "failed to connect: {}", error)
            }
            Error::HostKey(error) => {
                write!(f, "host key verification failed: {}", error)
            }
            Error::Authentication(error) => {
                write!(f, "authentication failed: {}", error)
            }
            Error::NotConnected => write!(f, "session is not connected"),
            Error::NoEditableDatastore => write!(
                f,
                "device supports neither the candidate nor the writable-running datastore"
            ),
            Error::TargetNotSupported(target) => {
                write!(f, "device does not support editing the {} datastore", target)
            }
            Error::XpathNotSupported => {
                write!(f, "device does not support XPath filtering")
            }
            Error::LockContention(target, errors) => {
                write!(f, "{} datastore is locked", target)?;
                if !errors.is_empty() {
                    write!(f, ": {}", format_rpc_errors(errors))?;
                }
                Ok(())
            }
            Error::AlreadyLocked(target) => {
                write!(f, "session already holds the {} lock", target)
            }
            Error::UnlockFailed { error, prior, .. } => {
                write!(f, "failed to release datastore lock: {}", error)?;
                if let Some(prior) = prior {
                    write!(f, " (after: {})", prior)?;
                }
                Ok(())
            }
            Error::Aborted { error, report } => {
                write!(f, "transaction aborted ({}): {}", report.outcome, error)
            }
            Error::EditRejected(rejection) => {
                write!(f, "edit rejected: {}", rejection)
            }
            Error::RpcFailed(phase, errors) => {
                write!(
                    f,
                    "{} request failed: {}",
                    phase,
                    format_rpc_errors(errors)
                )
            }
            Error::InvalidReply(phase, error) => {
                write!(f, "invalid {} reply: {}", phase, error)
            }
            Error::TransportTimeout(phase) => {
                write!(f, "{} request timed out", phase)
            }
            Error::Transport(phase, error) => {
                write!(f, "{} request failed: {}", phase, error)
            }
            Error::InvalidPayload(error) => {
                write!(f, "invalid configuration payload: {}", error)
            }
            Error::InvalidFilter(error) => {
                write!(f, "invalid filter: {}", error)
            }
        }
    }
}

impl std::error::Error for Error {}

// ===== helper functions =====

pub(crate) fn format_rpc_errors(errors: &[RpcError]) -> String {
    errors.iter().map(|error| error.to_string()).join("; ")
}

// ===== unit tests =====
