// error.rs — Error types for the decision-service side of the protocol.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while serving bridge connections.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The rendezvous socket could not be bound.
    #[error("failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Accepting, reading, or writing on a connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request frame does not hold `operation:user:origin[:...]`.
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    /// A response code does not fit the 3-byte response frame.
    #[error("response code {code} does not fit a response frame")]
    CodeOutOfRange { code: i32 },
}
