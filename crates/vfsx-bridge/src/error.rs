// error.rs — Error types for the bridge.
//
// Every variant here collapses to `Decision::Error` at the `BridgeClient::submit`
// boundary. They stay distinct so `try_submit` callers and the logs can tell a
// dead service from a garbled reply.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while encoding, sending, or receiving a request.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The socket could not be created or the connect attempt failed.
    #[error("failed to connect to decision service at {path}: {source}")]
    Connection { path: PathBuf, source: io::Error },

    /// A write or read on an established connection failed.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// The request frame was only partially written.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The connection closed before a full response frame arrived.
    #[error("short read: {read} of {expected} bytes")]
    ShortRead { read: usize, expected: usize },

    /// A read or write timeout expired.
    #[error("timed out waiting to {op}")]
    Timeout { op: &'static str },

    /// The response frame is not the text of an integer.
    #[error("unparseable response frame {raw:?}")]
    Protocol { raw: Vec<u8> },

    /// The encoded message does not fit the request frame.
    #[error("encoded message is {len} bytes, frame holds at most {capacity}")]
    MessageTooLarge { len: usize, capacity: usize },

    /// A descriptor field contains a NUL byte, which would end the message early.
    #[error("descriptor field contains an embedded NUL byte")]
    EmbeddedNul,

    /// The configuration file could not be read or parsed.
    #[error("failed to load config from {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Errors from the diagnostic message log.
#[derive(Debug, Error)]
pub enum MessageLogError {
    /// Failed to open or create the log file.
    #[error("failed to open message log at {path}: {source}")]
    OpenFailed { path: PathBuf, source: io::Error },

    /// Failed to write a record.
    #[error("failed to append record: {0}")]
    WriteFailed(#[from] io::Error),

    /// A record could not be serialized, or a line is not a valid record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BridgeError {
    /// Classify an I/O error from an established connection.
    ///
    /// Socket timeouts surface as `WouldBlock` on Unix and `TimedOut`
    /// elsewhere; both become `Timeout`.
    pub(crate) fn from_io(op: &'static str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => BridgeError::Timeout { op },
            _ => BridgeError::Transport(err),
        }
    }
}
