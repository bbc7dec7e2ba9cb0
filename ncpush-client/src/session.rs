//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

use crate::capabilities::{self, Capabilities};
use crate::datastore::{Datastore, Target};
use crate::debug::Debug;
use crate::error::{Error, Phase, Result};
use crate::payload::EditPayload;
use crate::rpc::{Filter, Hello, Rpc, RpcReply};
use crate::transport::{Transport, TransportError};

/// An open NETCONF session to a single device.
///
/// The session is the exclusive owner of its transport: every request is a
/// strict send-then-receive round-trip, so requests can never interleave.
/// Dropping an open session closes it on a best-effort basis.
#[derive(Debug)]
pub struct Session<T: Transport> {
    transport: T,
    host: String,
    state: SessionState,
    session_id: Option<u32>,
    capabilities: Capabilities,
    message_id: u64,
    // Datastore lock currently held by this session.
    pub(crate) lock: Option<Target>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SessionState {
    Open,
    Closed,
}

// ===== impl Session =====

impl<T: Transport> Session<T> {
    // Opens a session by exchanging hello messages over the transport.
    pub fn open(host: impl Into<String>, mut transport: T) -> Result<Session<T>> {
        let host = host.into();

        let hello = match exchange_hello(&mut transport) {
            Ok(hello) => hello,
            Err(error) => {
                let _ = transport.close();
                return Err(error);
            }
        };
        Debug::SessionOpen(&host).log();
        Debug::HelloRx(hello.session_id, &hello.capabilities).log();

        Ok(Session {
            transport,
            host,
            state: SessionState::Open,
            session_id: hello.session_id,
            capabilities: hello.capabilities,
            message_id: 0,
            lock: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    // Returns the capabilities advertised by the device.
    pub fn capabilities(&self) -> Result<&Capabilities> {
        self.ensure_open()?;
        Ok(&self.capabilities)
    }

    // Applies a payload to the target datastore.
    //
    // Rejections are returned as an error reply, not as an error.
    pub fn edit_config(
        &mut self,
        target: Target,
        payload: &EditPayload,
    ) -> Result<RpcReply> {
        self.execute(Rpc::EditConfig(target, payload), Phase::Edit)
    }

    // Reverts the candidate datastore to the running configuration.
    pub fn discard_changes(&mut self) -> Result<()> {
        self.execute(Rpc::DiscardChanges, Phase::Finalize)?
            .into_result(Phase::Finalize)?;
        Ok(())
    }

    // Commits the candidate datastore.
    //
    // A rejected commit is returned as an error reply, not as an error.
    pub fn commit(&mut self) -> Result<RpcReply> {
        self.execute(Rpc::Commit, Phase::Finalize)
    }

    // Retrieves configuration data, optionally filtered.
    pub fn get_config(
        &mut self,
        source: Datastore,
        filter: Option<&Filter>,
    ) -> Result<String> {
        if matches!(filter, Some(Filter::Xpath(_)))
            && !self.capabilities()?.contains(capabilities::XPATH)
        {
            return Err(Error::XpathNotSupported);
        }

        let reply = self
            .execute(Rpc::GetConfig(source, filter), Phase::Rpc)?
            .into_result(Phase::Rpc)?;
        match reply {
            RpcReply::Data(data) => Ok(data),
            _ => Ok(String::new()),
        }
    }

    // Sends an arbitrary pre-built RPC body (the content of the <rpc>
    // element), for operations outside the edit-config/commit model.
    pub fn rpc(&mut self, body: &str) -> Result<RpcReply> {
        self.execute(Rpc::Raw(body), Phase::Rpc)
    }

    // Gracefully terminates the session.
    //
    // Closing an already closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }

        let reply = self.execute(Rpc::CloseSession, Phase::Close);
        self.state = SessionState::Closed;
        let transport = self
            .transport
            .close()
            .map_err(|error| Error::transport(Phase::Close, error));
        Debug::SessionClose(&self.host).log();

        reply?.into_result(Phase::Close)?;
        transport
    }

    // Performs one request/reply round-trip.
    //
    // Replies to earlier requests that timed out are read and dropped until
    // the reply matching this request arrives.
    pub(crate) fn execute(&mut self, rpc: Rpc<'_>, phase: Phase) -> Result<RpcReply> {
        self.ensure_open()?;

        self.message_id += 1;
        let message_id = self.message_id;
        let request = rpc.encode(message_id);
        Debug::RpcTx(message_id, rpc.name(), &request).log();

        self.transport
            .send(&request)
            .map_err(|error| self.transport_error(phase, error))?;
        loop {
            let reply = self
                .transport
                .recv()
                .map_err(|error| self.transport_error(phase, error))?;
            Debug::RpcRx(message_id, &reply).log();

            let (reply_id, reply) = RpcReply::decode_with_id(&reply)
                .map_err(|error| Error::InvalidReply(phase, error))?;
            match reply_id {
                Some(reply_id) if reply_id < message_id => {
                    warn!(%reply_id, %message_id, "discarding stale reply");
                }
                Some(reply_id) if reply_id != message_id => {
                    return Err(Error::InvalidReply(
                        phase,
                        format!(
                            "unexpected message-id {} (expected {})",
                            reply_id, message_id
                        ),
                    ));
                }
                _ => return Ok(reply),
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(Error::NotConnected),
        }
    }

    fn transport_error(
        &mut self,
        phase: Phase,
        error: TransportError,
    ) -> Error {
        // The peer is gone, nothing else can be sent on this session.
        if matches!(error, TransportError::Closed) {
            self.state = SessionState::Closed;
        }
        Error::transport(phase, error)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.is_open()
            && let Err(error) = self.close()
        {
            warn!(host = %self.host, %error, "failed to close session");
        }
    }
}

// ===== helper functions =====

fn exchange_hello<T: Transport>(transport: &mut T) -> Result<Hello> {
    transport
        .send(&Hello::encode_client())
        .map_err(|error| Error::transport(Phase::Capabilities, error))?;
    let hello = transport
        .recv()
        .map_err(|error| Error::transport(Phase::Capabilities, error))?;
    Hello::decode(&hello).map_err(|error| Error::InvalidReply(Phase::Capabilities, error))
}
