//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span, trace, trace_span};

use crate::capabilities::Capabilities;
use crate::datastore::Target;
use crate::transaction::{EditResult, Outcome};

// Protocol-level debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Session
    SessionOpen(&'a str),
    HelloRx(Option<u32>, &'a Capabilities),
    SessionClose(&'a str),
    // RPC exchange
    RpcTx(u64, &'static str, &'a str),
    RpcRx(u64, &'a str),
    // Transaction
    TargetSelect(Target),
    LockAcquire(Target),
    LockRelease(Target),
    EditResult(usize, &'a EditResult),
    TransactionDone(Target, Outcome),
}

// ===== impl Debug =====

impl Debug<'_> {
    pub(crate) fn log(&self) {
        match self {
            Debug::SessionOpen(host) | Debug::SessionClose(host) => {
                debug!(%host, "{}", self);
            }
            Debug::HelloRx(session_id, capabilities) => {
                debug_span!("hello").in_scope(|| {
                    debug!(?session_id, count = capabilities.len(), "{}", self);
                    for capability in capabilities.iter() {
                        trace!(%capability, "capability");
                    }
                });
            }
            Debug::RpcTx(message_id, operation, data) => {
                trace_span!("rpc").in_scope(|| {
                    trace_span!("output").in_scope(|| {
                        trace!(%message_id, %operation, %data, "{}", self);
                    })
                });
            }
            Debug::RpcRx(message_id, data) => {
                trace_span!("rpc").in_scope(|| {
                    trace_span!("input").in_scope(|| {
                        trace!(%message_id, %data, "{}", self);
                    })
                });
            }
            Debug::TargetSelect(target)
            | Debug::LockAcquire(target)
            | Debug::LockRelease(target) => {
                debug!(%target, "{}", self);
            }
            Debug::EditResult(index, result) => {
                debug!(%index, %result, "{}", self);
            }
            Debug::TransactionDone(target, outcome) => {
                debug!(%target, %outcome, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::SessionOpen(..) => write!(f, "session opened"),
            Debug::HelloRx(..) => write!(f, "received hello"),
            Debug::SessionClose(..) => write!(f, "session closed"),
            Debug::RpcTx(..) => write!(f, "sending rpc"),
            Debug::RpcRx(..) => write!(f, "received rpc-reply"),
            Debug::TargetSelect(..) => write!(f, "target datastore selected"),
            Debug::LockAcquire(..) => write!(f, "lock acquired"),
            Debug::LockRelease(..) => write!(f, "lock released"),
            Debug::EditResult(..) => write!(f, "edit processed"),
            Debug::TransactionDone(..) => write!(f, "transaction finished"),
        }
    }
}
