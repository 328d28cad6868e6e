//! # vfsx-service
//!
//! The other end of the VFSX bridge: accepts bridge connections on the
//! rendezvous socket, decodes request frames, keeps per-(origin, user)
//! sessions, and answers each request with the code a [`DecisionHandler`]
//! returns.
//!
//! This crate is protocol plumbing only. What gets allowed or denied is up to
//! the handler you plug in.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use vfsx_bridge::protocol::{DEFAULT_SOCKET_PATH, FAIL_AUTHORIZATION, SUCCESS_TRANSPARENT};
//! use vfsx_service::{Request, Server, Session};
//!
//! let server = Server::bind(DEFAULT_SOCKET_PATH, |_: &Session, req: &Request| {
//!     match req.target.as_deref() {
//!         Some(t) if t.starts_with(".secret") => FAIL_AUTHORIZATION,
//!         _ => SUCCESS_TRANSPARENT,
//!     }
//! })?;
//! server.serve()?;
//! # Ok::<(), vfsx_service::ServiceError>(())
//! ```

pub mod error;
pub mod handler;
pub mod request;
pub mod server;

pub use error::ServiceError;
pub use handler::{DecisionHandler, Dispatcher, Session, SessionRegistry, Transparent};
pub use request::{decode_request, encode_response, Request};
pub use server::{serve_connection, Server};
