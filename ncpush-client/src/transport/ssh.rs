//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use ssh2::{CheckResult, KnownHostFileKind};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{EomCodec, Transport, TransportError};

// libssh2 error code returned when a blocking call exceeds the session
// timeout.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: Auth,
    // Per round-trip timeout, in seconds.
    pub timeout: u64,
    pub hostkey_verify: bool,
    pub known_hosts: Option<String>,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum Auth {
    Password {
        password: String,
    },
    KeyFile {
        private_key: String,
        passphrase: Option<String>,
    },
    Agent,
}

// NETCONF over the SSH "netconf" subsystem (RFC 6242), using the base:1.0
// end-of-message framing.
pub struct SshTransport {
    // The channel must be dropped before the session owning it.
    channel: ssh2::Channel,
    session: ssh2::Session,
    codec: EomCodec,
    peer: String,
}

// ===== impl ConnectParams =====

impl ConnectParams {
    pub const DFLT_PORT: u16 = 830;
    pub const DFLT_TIMEOUT: u64 = 30;

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn known_hosts_path(&self) -> Option<PathBuf> {
        match &self.known_hosts {
            Some(path) => Some(PathBuf::from(path)),
            None => std::env::var_os("HOME")
                .map(|home| Path::new(&home).join(".ssh/known_hosts")),
        }
    }
}

impl Default for ConnectParams {
    fn default() -> ConnectParams {
        ConnectParams {
            host: "localhost".to_owned(),
            port: ConnectParams::DFLT_PORT,
            username: "admin".to_owned(),
            auth: Auth::Agent,
            timeout: ConnectParams::DFLT_TIMEOUT,
            hostkey_verify: true,
            known_hosts: None,
        }
    }
}

// ===== impl Auth =====

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
            Auth::KeyFile { private_key, .. } => f
                .debug_struct("KeyFile")
                .field("private_key", private_key)
                .finish_non_exhaustive(),
            Auth::Agent => write!(f, "Agent"),
        }
    }
}

// ===== impl SshTransport =====

impl SshTransport {
    pub fn connect(params: &ConnectParams) -> Result<SshTransport> {
        let peer = format!("{}:{}", params.host, params.port);

        // Establish the TCP connection.
        let addr = (params.host.as_str(), params.port)
            .to_socket_addrs()
            .map_err(|error| Error::Connect(format!("{}: {}", peer, error)))?
            .next()
            .ok_or_else(|| {
                Error::Connect(format!("{}: no address found", peer))
            })?;
        let tcp = TcpStream::connect_timeout(&addr, params.timeout())
            .map_err(|error| Error::Connect(format!("{}: {}", peer, error)))?;

        // Perform the SSH handshake.
        let mut session = ssh2::Session::new()
            .map_err(|error| Error::Connect(error.to_string()))?;
        let timeout_ms =
            u32::try_from(params.timeout().as_millis()).unwrap_or(u32::MAX);
        session.set_timeout(timeout_ms);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|error| Error::Connect(format!("{}: {}", peer, error)))?;

        if params.hostkey_verify {
            verify_host_key(&session, params)?;
        } else {
            debug!(%peer, "host key verification disabled");
        }

        authenticate(&session, params)?;

        // Open the NETCONF subsystem.
        let mut channel = session
            .channel_session()
            .map_err(|error| Error::Connect(error.to_string()))?;
        channel.subsystem("netconf").map_err(|error| {
            Error::Connect(format!("netconf subsystem: {}", error))
        })?;

        debug!(%peer, "SSH channel established");

        Ok(SshTransport {
            channel,
            session,
            codec: EomCodec::default(),
            peer,
        })
    }
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl Transport for SshTransport {
    fn send(&mut self, message: &str) -> std::result::Result<(), TransportError> {
        self.channel.write_all(&EomCodec::encode(message))?;
        self.channel.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> std::result::Result<String, TransportError> {
        self.codec.decode(&mut self.channel)
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        self.channel.send_eof().map_err(ssh_error)?;
        self.channel.close().map_err(ssh_error)?;
        self.channel.wait_close().map_err(ssh_error)?;
        self.session
            .disconnect(None, "session closed", None)
            .map_err(ssh_error)?;
        Ok(())
    }
}

// ===== helper functions =====

fn verify_host_key(session: &ssh2::Session, params: &ConnectParams) -> Result<()> {
    let path = params.known_hosts_path().ok_or_else(|| {
        Error::HostKey("unable to locate known_hosts file".to_owned())
    })?;
    let (key, _) = session
        .host_key()
        .ok_or_else(|| Error::HostKey("no host key received".to_owned()))?;

    let mut known_hosts = session
        .known_hosts()
        .map_err(|error| Error::HostKey(error.to_string()))?;
    known_hosts
        .read_file(&path, KnownHostFileKind::OpenSSH)
        .map_err(|error| {
            Error::HostKey(format!("{}: {}", path.display(), error))
        })?;

    match known_hosts.check_port(&params.host, params.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(Error::HostKey(format!(
            "no entry for {} in {}",
            params.host,
            path.display()
        ))),
        CheckResult::Mismatch => Err(Error::HostKey(format!(
            "host key for {} does not match {}",
            params.host,
            path.display()
        ))),
        CheckResult::Failure => {
            Err(Error::HostKey("failed to check host key".to_owned()))
        }
    }
}

fn authenticate(session: &ssh2::Session, params: &ConnectParams) -> Result<()> {
    let result = match &params.auth {
        Auth::Password { password } => {
            session.userauth_password(&params.username, password)
        }
        Auth::KeyFile {
            private_key,
            passphrase,
        } => session.userauth_pubkey_file(
            &params.username,
            None,
            Path::new(private_key),
            passphrase.as_deref(),
        ),
        Auth::Agent => session.userauth_agent(&params.username),
    };
    result.map_err(|error| Error::Authentication(error.to_string()))?;

    if !session.authenticated() {
        return Err(Error::Authentication(format!(
            "user {} was not accepted",
            params.username
        )));
    }

    Ok(())
}

fn ssh_error(error: ssh2::Error) -> TransportError {
    match error.code() {
        ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => {
            TransportError::Timeout
        }
        _ => TransportError::Ssh(error.to_string()),
    }
}
