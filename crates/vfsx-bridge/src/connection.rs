// connection.rs — Connection Manager.
//
// Owns the bridge's single stream to the decision service. The stream is
// opened lazily by `ensure_connected`, and any transport failure drops it so
// the *next* request starts from `Disconnected` and dials again. There is no
// retry loop inside a single call.
//
// State machine:
//
//   Disconnected --connect ok--> Connected
//   Connected --write/read failure--> Disconnected
//   Connected --successful "disconnect" round trip--> Disconnected

use std::io::{self, Read, Write};

use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::protocol::{REQUEST_FRAME_SIZE, RESPONSE_FRAME_SIZE};
use crate::transport::Connector;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// The bridge's channel to the decision service.
///
/// Invariant: `stream.is_some()` exactly when connected, and the stream came
/// from a successful connect since the last failure or `close`.
pub struct Connection<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    /// Request frames fully written since this Connection was created.
    messages_sent: u64,
    /// Successful connect attempts since this Connection was created.
    connects: u64,
}

impl<C: Connector> Connection<C> {
    /// Create a disconnected Connection. Nothing is dialled until first use.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            stream: None,
            messages_sent: 0,
            connects: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub fn connect_count(&self) -> u64 {
        self.connects
    }

    /// Make sure a stream is open, dialling once if it is not.
    pub fn ensure_connected(&mut self) -> Result<(), BridgeError> {
        if self.stream.is_some() {
            return Ok(());
        }
        match self.connector.connect() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.connects += 1;
                info!(endpoint = %self.connector.endpoint().display(), "connected to decision service");
                Ok(())
            }
            Err(source) => {
                warn!(
                    endpoint = %self.connector.endpoint().display(),
                    error = %source,
                    "connect to decision service failed"
                );
                match source.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                        Err(BridgeError::Timeout { op: "connect" })
                    }
                    _ => Err(BridgeError::Connection {
                        path: self.connector.endpoint().to_path_buf(),
                        source,
                    }),
                }
            }
        }
    }

    /// Drop the stream and mark the connection disconnected. Idempotent.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("connection to decision service closed");
        }
    }

    /// Write one full request frame. Closes the connection on any failure.
    pub fn send_frame(&mut self, frame: &[u8; REQUEST_FRAME_SIZE]) -> Result<(), BridgeError> {
        let result = match self.stream.as_mut() {
            Some(stream) => write_full(stream, frame),
            None => Err(BridgeError::Transport(io::Error::from(io::ErrorKind::NotConnected))),
        };
        match result {
            Ok(()) => {
                self.messages_sent += 1;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "request write failed, dropping connection");
                self.close();
                Err(e)
            }
        }
    }

    /// Read one full response frame. Closes the connection on any failure.
    pub fn recv_frame(&mut self) -> Result<[u8; RESPONSE_FRAME_SIZE], BridgeError> {
        let mut frame = [0u8; RESPONSE_FRAME_SIZE];
        let result = match self.stream.as_mut() {
            Some(stream) => read_full(stream, &mut frame),
            None => Err(BridgeError::Transport(io::Error::from(io::ErrorKind::NotConnected))),
        };
        match result {
            Ok(()) => Ok(frame),
            Err(e) => {
                warn!(error = %e, "response read failed, dropping connection");
                self.close();
                Err(e)
            }
        }
    }
}

/// Like `write_all`, but reports how far a stalled write got.
fn write_full<W: Write>(stream: &mut W, buf: &[u8]) -> Result<(), BridgeError> {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => {
                return Err(BridgeError::ShortWrite {
                    written,
                    expected: buf.len(),
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(BridgeError::from_io("write request", e)),
        }
    }
    stream
        .flush()
        .map_err(|e| BridgeError::from_io("write request", e))
}

/// Like `read_exact`, but reports how far a truncated read got.
fn read_full<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<(), BridgeError> {
    let mut read = 0;
    while read < buf.len() {
        match stream.read(&mut buf[read..]) {
            Ok(0) => {
                return Err(BridgeError::ShortRead {
                    read,
                    expected: buf.len(),
                })
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(BridgeError::from_io("read response", e)),
        }
    }
    Ok(())
}
