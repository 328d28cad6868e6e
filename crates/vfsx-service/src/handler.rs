// handler.rs — Session tracking and dispatch to a DecisionHandler.
//
// The service keeps one Session per (origin, user) pair. A session is created
// the first time a request for that pair arrives and forgotten after its
// "disconnect" request. Deciding is delegated to a DecisionHandler, which is
// where a service author's policy lives; this crate ships none.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};
use vfsx_bridge::protocol::{FAIL_ERROR, FAIL_NOT_IMPLEMENTED, SUCCESS_TRANSPARENT};
use vfsx_bridge::Operation;

use crate::request::{decode_request, Request};

/// Per-(origin, user) state visible to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub origin: String,
    pub user: String,
    /// Requests seen in this session, including the current one.
    pub requests: u64,
}

/// Decides one request. Returns a wire response code.
///
/// Handlers are shared across connection threads, hence `&self` and
/// `Send + Sync`. Use the reserved codes in `vfsx_bridge::protocol`.
pub trait DecisionHandler: Send + Sync {
    fn decide(&self, _session: &Session, _request: &Request) -> i32 {
        FAIL_NOT_IMPLEMENTED
    }
}

/// Lets every known operation through and answers "not implemented" for the
/// rest. A starting point for handlers that only care about a few operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Transparent;

impl DecisionHandler for Transparent {
    fn decide(&self, _session: &Session, request: &Request) -> i32 {
        match request.operation {
            Operation::Other(_) => FAIL_NOT_IMPLEMENTED,
            _ => SUCCESS_TRANSPARENT,
        }
    }
}

impl<F> DecisionHandler for F
where
    F: Fn(&Session, &Request) -> i32 + Send + Sync,
{
    fn decide(&self, session: &Session, request: &Request) -> i32 {
        self(session, request)
    }
}

/// Live sessions keyed by (origin, user).
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<(String, String), Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against its session, creating the session if needed.
    /// A "disconnect" request removes the session after counting it.
    ///
    /// Returns a snapshot of the session as of this request.
    pub fn track(&self, request: &Request) -> Session {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = request.session_key();

        let session = sessions.entry(key.clone()).or_insert_with(|| {
            debug!(origin = %request.origin, user = %request.user, "new session");
            Session {
                origin: request.origin.clone(),
                user: request.user.clone(),
                requests: 0,
            }
        });
        session.requests += 1;
        let snapshot = session.clone();

        if request.operation.closes_connection() {
            sessions.remove(&key);
            debug!(origin = %request.origin, user = %request.user, "removed session");
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, origin: &str, user: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&(origin.to_string(), user.to_string()))
    }
}

/// Turns request frames into response codes.
pub struct Dispatcher {
    handler: Arc<dyn DecisionHandler>,
    sessions: SessionRegistry,
}

impl Dispatcher {
    pub fn new(handler: impl DecisionHandler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            sessions: SessionRegistry::new(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Decode, track, and decide one frame.
    ///
    /// Undecodable frames and panicking handlers answer FAIL_ERROR; the
    /// connection itself stays usable.
    pub fn dispatch(&self, frame: &[u8]) -> i32 {
        let request = match decode_request(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "rejecting request");
                return FAIL_ERROR;
            }
        };
        debug!(
            operation = %request.operation,
            user = %request.user,
            origin = %request.origin,
            target = request.target.as_deref().unwrap_or("-"),
            "request"
        );

        let session = self.sessions.track(&request);
        let handler = &self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.decide(&session, &request))) {
            Ok(code) => code,
            Err(_) => {
                error!(operation = %request.operation, "decision handler panicked");
                FAIL_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfsx_bridge::protocol::FAIL_AUTHORIZATION;

    #[test]
    fn transparent_allows_known_operations() {
        let dispatcher = Dispatcher::new(Transparent);
        assert_eq!(dispatcher.dispatch(b"open:alice:/srv:f,0,420"), SUCCESS_TRANSPARENT);
        assert_eq!(dispatcher.dispatch(b"symlink:alice:/srv:a,b"), FAIL_NOT_IMPLEMENTED);
    }

    #[test]
    fn default_decide_is_not_implemented() {
        struct Nothing;
        impl DecisionHandler for Nothing {}

        let dispatcher = Dispatcher::new(Nothing);
        assert_eq!(dispatcher.dispatch(b"connect:alice:/srv"), FAIL_NOT_IMPLEMENTED);
    }

    #[test]
    fn malformed_frame_is_error() {
        let dispatcher = Dispatcher::new(Transparent);
        assert_eq!(dispatcher.dispatch(b"garbage"), FAIL_ERROR);
    }

    #[test]
    fn closure_handlers_see_session_and_request() {
        let dispatcher = Dispatcher::new(|session: &Session, request: &Request| {
            if session.user == "mallory" || request.target.as_deref() == Some("secret") {
                FAIL_AUTHORIZATION
            } else {
                SUCCESS_TRANSPARENT
            }
        });
        assert_eq!(dispatcher.dispatch(b"read:alice:/srv:notes"), SUCCESS_TRANSPARENT);
        assert_eq!(dispatcher.dispatch(b"read:alice:/srv:secret"), FAIL_AUTHORIZATION);
        assert_eq!(dispatcher.dispatch(b"read:mallory:/srv:notes"), FAIL_AUTHORIZATION);
    }

    #[test]
    fn one_session_per_origin_and_user() {
        let dispatcher = Dispatcher::new(Transparent);
        dispatcher.dispatch(b"connect:alice:/srv");
        dispatcher.dispatch(b"open:alice:/srv:f,0,0");
        dispatcher.dispatch(b"connect:bob:/srv");
        dispatcher.dispatch(b"connect:alice:/other");
        assert_eq!(dispatcher.sessions().len(), 3);
    }

    #[test]
    fn session_counts_requests() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::new(move |session: &Session, _: &Request| {
            sink.lock().unwrap().push(session.requests);
            SUCCESS_TRANSPARENT
        });
        dispatcher.dispatch(b"connect:alice:/srv");
        dispatcher.dispatch(b"read:alice:/srv:f");
        dispatcher.dispatch(b"disconnect:alice:/srv");
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn disconnect_removes_session() {
        let dispatcher = Dispatcher::new(Transparent);
        dispatcher.dispatch(b"connect:alice:/srv");
        assert!(dispatcher.sessions().contains("/srv", "alice"));
        dispatcher.dispatch(b"disconnect:alice:/srv");
        assert!(!dispatcher.sessions().contains("/srv", "alice"));
        assert!(dispatcher.sessions().is_empty());
    }

    #[test]
    fn panicking_handler_answers_error() {
        let dispatcher = Dispatcher::new(|_: &Session, _: &Request| -> i32 { panic!("boom") });
        assert_eq!(dispatcher.dispatch(b"open:alice:/srv:f"), FAIL_ERROR);
    }
}
