//! # vfsx-bridge
//!
//! Asks an external decision service whether a filesystem operation may go
//! ahead, over a long-lived Unix stream socket.
//!
//! The interception layer builds an [`OperationDescriptor`] for each gated
//! call and passes it to [`BridgeClient::submit`]. The client encodes it as a
//! fixed 512-byte request frame, waits for a fixed 3-byte response, and
//! returns a [`Decision`]. Only `Decision::Proceed` permits the real
//! operation.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use vfsx_bridge::{BridgeClient, BridgeConfig, Decision, OperationDescriptor};
//!
//! let client = BridgeClient::from_config(&BridgeConfig::default());
//! let open = OperationDescriptor::open("alice", "/srv", "file.txt", 0, 0o644);
//! if client.submit(&open) == Decision::Proceed {
//!     // perform the real open(2)
//! }
//! ```
//!
//! ## Key invariants
//!
//! - **Fail closed**: any encoding, connection, transport, or protocol
//!   failure yields `Decision::Error`, never `Proceed`.
//! - **No truncation**: a message that does not fit the frame is rejected.
//! - **Reconnect lazily**: a failed round trip drops the connection; the next
//!   call dials again. Nothing retries inside a call.
//! - **One request in flight**: the client serializes callers internally.

pub mod client;
pub mod config;
pub mod connection;
pub mod decision;
pub mod encoder;
pub mod error;
pub mod message_log;
pub mod operation;
pub mod protocol;
pub mod transport;

pub use client::BridgeClient;
pub use config::BridgeConfig;
pub use connection::{Connection, ConnectionState};
pub use decision::{interpret, interpret_frame, parse_response, Decision};
pub use encoder::{encode, WireMessage};
pub use error::{BridgeError, MessageLogError};
pub use message_log::{MessageLog, MessageRecord, MessageSink};
pub use operation::{Arg, Operation, OperationDescriptor};
pub use transport::{Connector, UnixConnector};
