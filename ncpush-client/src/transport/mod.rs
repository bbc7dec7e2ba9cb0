//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod ssh;

use std::io::Read;

// NETCONF 1.0 end-of-message delimiter.
pub const EOM_DELIMITER: &[u8] = b"]]>]]>";

// Upper bound on the size of a single incoming message.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// A bidirectional channel carrying whole NETCONF messages.
///
/// Implementations own the message framing; the session layer only ever sees
/// complete XML documents.
pub trait Transport: std::fmt::Debug {
    // Sends a complete NETCONF message.
    fn send(&mut self, message: &str) -> Result<(), TransportError>;

    // Receives the next complete NETCONF message.
    fn recv(&mut self) -> Result<String, TransportError>;

    // Closes the underlying channel.
    fn close(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug)]
pub enum TransportError {
    Timeout,
    Closed,
    Io(std::io::Error),
    Ssh(String),
    Framing(String),
}

// Splits a byte stream into NETCONF 1.0 messages.
#[derive(Debug)]
pub struct EomCodec {
    buf: Vec<u8>,
    // Length of the buffer prefix already searched for the delimiter.
    scanned: usize,
    max_size: usize,
}

// ===== impl TransportError =====

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "operation timed out"),
            TransportError::Closed => write!(f, "channel closed by peer"),
            TransportError::Io(error) => write!(f, "I/O error: {}", error),
            TransportError::Ssh(error) => write!(f, "SSH error: {}", error),
            TransportError::Framing(error) => {
                write!(f, "framing error: {}", error)
            }
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> TransportError {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                TransportError::Timeout
            }
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => TransportError::Closed,
            _ => TransportError::Io(error),
        }
    }
}

// ===== impl EomCodec =====

impl EomCodec {
    const READ_CHUNK: usize = 8192;

    // Appends the end-of-message delimiter to an outgoing message.
    pub fn encode(message: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(message.len() + EOM_DELIMITER.len());
        buf.extend_from_slice(message.as_bytes());
        buf.extend_from_slice(EOM_DELIMITER);
        buf
    }

    // Reads from the stream until a complete message is buffered.
    //
    // Bytes following the delimiter are kept for the next call.
    pub fn decode<R: Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<String, TransportError> {
        let mut chunk = [0; Self::READ_CHUNK];
        loop {
            if let Some(message) = self.next_message()? {
                return Ok(message);
            }

            let n = reader.read(&mut chunk)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn next_message(&mut self) -> Result<Option<String>, TransportError> {
        // The delimiter may straddle the previously searched prefix.
        let start = self.scanned.saturating_sub(EOM_DELIMITER.len() - 1);
        let Some(pos) = self.buf[start..]
            .windows(EOM_DELIMITER.len())
            .position(|window| window == EOM_DELIMITER)
            .map(|pos| start + pos)
        else {
            if self.buf.len() > self.max_size {
                self.buf.clear();
                self.scanned = 0;
                return Err(TransportError::Framing(format!(
                    "message exceeds {} bytes",
                    self.max_size
                )));
            }
            self.scanned = self.buf.len();
            return Ok(None);
        };

        let mut message: Vec<u8> =
            self.buf.drain(..pos + EOM_DELIMITER.len()).collect();
        message.truncate(pos);
        self.scanned = 0;
        let message = String::from_utf8(message).map_err(|error| {
            TransportError::Framing(format!("invalid UTF-8: {}", error))
        })?;
        Ok(Some(message.trim().to_owned()))
    }
}

impl Default for EomCodec {
    fn default() -> EomCodec {
        EomCodec {
            buf: Vec::new(),
            scanned: 0,
            max_size: MAX_MESSAGE_SIZE,
        }
    }
}

// ===== unit tests =====
