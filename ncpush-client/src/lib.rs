//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Transactional NETCONF configuration pusher.
//!
//! The crate opens a NETCONF session to a device, negotiates which datastore
//! can be edited (candidate preferred over writable-running), and applies an
//! ordered list of pre-serialized `edit-config` payloads inside a locked
//! transaction that is either committed or rolled back as a whole.

mod debug;

pub mod capabilities;
pub mod datastore;
pub mod error;
pub mod iosxe;
pub mod lock;
pub mod payload;
pub mod pusher;
pub mod rpc;
pub mod session;
pub mod transaction;
pub mod transport;

pub use capabilities::Capabilities;
pub use datastore::{Datastore, Target};
pub use error::{Error, Phase, Result};
pub use lock::LockGuard;
pub use payload::{EditPayload, FileSource, PayloadSource};
pub use pusher::{LockRetry, PushOptions, PushReport, Pusher};
pub use rpc::{Filter, RpcError, RpcReply};
pub use session::Session;
pub use transaction::{
    EditRejection, EditResult, Outcome, RejectionKind, Transaction,
    TransactionReport,
};
pub use transport::ssh::{Auth, ConnectParams, SshTransport};
pub use transport::{Transport, TransportError};
