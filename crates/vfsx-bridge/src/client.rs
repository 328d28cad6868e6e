// client.rs — Bridge Client: the one entry point the interception layer calls.
//
// For each gated operation:
//
//   1. encode the descriptor (failure → Error, connection untouched)
//   2. note whether this is a "disconnect"
//   3. ensure the connection is up (failure → Error)
//   4. write one 512-byte request frame (failure → close, Error, no read)
//   5. read one 3-byte response frame (failure → close, Error)
//   6. parse and interpret the response
//   7. after a parsed "disconnect" reply, close the connection
//   8. return the Decision
//
// The whole sequence runs under one mutex. The wire protocol has no request
// ids, so two callers sharing the socket without it would read each other's
// replies.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::connection::{Connection, ConnectionState};
use crate::decision::{interpret, parse_response, Decision};
use crate::encoder::{encode, WireMessage};
use crate::error::BridgeError;
use crate::message_log::{MessageLog, MessageRecord, MessageSink};
use crate::operation::OperationDescriptor;
use crate::transport::{Connector, UnixConnector};

/// Asks the decision service about gated operations over one owned connection.
///
/// `submit` takes `&self`, so a single client can be shared between threads
/// (e.g. behind an `Arc`); requests are serialized internally.
pub struct BridgeClient<C: Connector = UnixConnector> {
    inner: Mutex<Inner<C>>,
}

struct Inner<C: Connector> {
    connection: Connection<C>,
    sink: Option<Box<dyn MessageSink>>,
}

impl BridgeClient<UnixConnector> {
    /// Build a client from configuration.
    ///
    /// A message log that cannot be opened is reported and skipped; the
    /// bridge works the same without it.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let client = Self::new(config.connector());
        match &config.message_log {
            Some(path) => match MessageLog::open(path) {
                Ok(log) => client.with_sink(log),
                Err(e) => {
                    warn!(error = %e, "message log disabled");
                    client
                }
            },
            None => client,
        }
    }
}

impl<C: Connector> BridgeClient<C> {
    /// Create a client. Nothing is dialled until the first `submit`.
    pub fn new(connector: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                connection: Connection::new(connector),
                sink: None,
            }),
        }
    }

    /// Attach a diagnostic sink that sees every round trip.
    pub fn with_sink(self, sink: impl MessageSink + 'static) -> Self {
        let mut inner = self.into_inner();
        inner.sink = Some(Box::new(sink));
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Ask the decision service whether `descriptor` may proceed.
    ///
    /// Only `Decision::Proceed` allows the caller to perform the real
    /// operation. Every failure, whatever its cause, is `Decision::Error`.
    pub fn submit(&self, descriptor: &OperationDescriptor) -> Decision {
        match self.try_submit(descriptor) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(operation = %descriptor.operation(), error = %e, "gated operation blocked by bridge error");
                Decision::Error
            }
        }
    }

    /// Like `submit`, but keeps the reason a round trip produced no answer.
    pub fn try_submit(&self, descriptor: &OperationDescriptor) -> Result<Decision, BridgeError> {
        let mut inner = self.lock();
        let close_after = descriptor.operation().closes_connection();

        let (message, result) = match encode(descriptor) {
            Ok(message) => {
                let result = inner.exchange(&message, close_after);
                (Some(message), result)
            }
            Err(e) => (None, Err(e)),
        };

        if let Ok(decision) = &result {
            info!(
                operation = %descriptor.operation(),
                user = descriptor.user(),
                decision = %decision,
                sequence = inner.connection.messages_sent(),
                "decision received"
            );
        }
        inner.record(descriptor, message.as_ref(), &result);
        result
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().connection.state()
    }

    /// Request frames fully written since this client was created.
    pub fn messages_sent(&self) -> u64 {
        self.lock().connection.messages_sent()
    }

    /// Successful connects since this client was created.
    pub fn connect_count(&self) -> u64 {
        self.lock().connection.connect_count()
    }

    /// Drop the connection now; the next `submit` reconnects.
    pub fn close(&self) {
        self.lock().connection.close();
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        // A panic mid-exchange may have left a half-read frame on the socket.
        self.inner.lock().unwrap_or_else(|poisoned| {
            let mut inner = poisoned.into_inner();
            inner.connection.close();
            inner
        })
    }

    fn into_inner(self) -> Inner<C> {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: Connector> Inner<C> {
    fn exchange(&mut self, message: &WireMessage, close_after: bool) -> Result<Decision, BridgeError> {
        self.connection.ensure_connected()?;
        self.connection.send_frame(&message.to_frame())?;
        debug!(wire = message.as_str(), "request sent");

        let frame = self.connection.recv_frame()?;
        let code = parse_response(&frame)?;

        if close_after {
            self.connection.close();
        }
        Ok(interpret(code))
    }

    fn record(
        &mut self,
        descriptor: &OperationDescriptor,
        message: Option<&WireMessage>,
        result: &Result<Decision, BridgeError>,
    ) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let decision = result.as_ref().copied().unwrap_or(Decision::Error);
        let mut record = MessageRecord::new(
            descriptor.operation().as_str(),
            decision,
            self.connection.messages_sent(),
        );
        if let Some(message) = message {
            record = record.with_message(message.as_str());
        }
        if let Err(e) = result {
            record = record.with_error(e.to_string());
        }
        if let Err(e) = sink.record(&record) {
            warn!(error = %e, "failed to write message log record");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;
    use crate::error::MessageLogError;
    use crate::operation::Operation;
    use crate::protocol::REQUEST_FRAME_SIZE;
    use crate::transport::testing::{Script, ScriptedConnector};

    fn open_alice() -> OperationDescriptor {
        OperationDescriptor::open("alice", "/srv", "file.txt", 0, 0o644)
    }

    #[test]
    fn proceed_on_zero() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"0  ".to_vec()])]);
        let client = BridgeClient::new(connector.clone());

        assert_eq!(client.submit(&open_alice()), Decision::Proceed);

        let written = connector.log.lock().unwrap().written.clone();
        assert_eq!(written.len(), REQUEST_FRAME_SIZE);
        assert!(written.starts_with(b"open:alice:/srv:file.txt,0,420\0"));
    }

    #[test]
    fn denied_on_minus_two() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"-2 ".to_vec()])]);
        let client = BridgeClient::new(connector);
        let rename = OperationDescriptor::rename("bob", "/srv", "a.txt", "b.txt");
        assert_eq!(client.submit(&rename), Decision::Denied);
    }

    #[test]
    fn unreachable_service_is_error_without_sending() {
        let connector = ScriptedConnector::new(vec![]);
        let client = BridgeClient::new(connector.clone());

        assert!(matches!(
            client.try_submit(&open_alice()),
            Err(BridgeError::Connection { .. })
        ));
        assert_eq!(client.submit(&open_alice()), Decision::Error);
        assert_eq!(connector.bytes_written(), 0);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn encoding_failure_never_touches_connection() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"0  ".to_vec()])]);
        let client = BridgeClient::new(connector.clone());
        let huge = OperationDescriptor::on_path(Operation::Unlink, "u", "/o", "x".repeat(600));

        assert_eq!(client.submit(&huge), Decision::Error);
        assert_eq!(connector.connects(), 0);
    }

    #[test]
    fn write_failure_disconnects_and_skips_read() {
        let connector = ScriptedConnector::new(vec![Script::FailWrite]);
        let client = BridgeClient::new(connector.clone());

        assert_eq!(client.submit(&open_alice()), Decision::Error);
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(connector.reads_attempted(), 0);
    }

    #[test]
    fn read_failure_disconnects() {
        let connector = ScriptedConnector::new(vec![Script::FailRead]);
        let client = BridgeClient::new(connector);

        assert_eq!(client.submit(&open_alice()), Decision::Error);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn failed_round_trip_reconnects_on_next_submit() {
        let connector = ScriptedConnector::new(vec![
            Script::FailRead,
            Script::Replies(vec![b"0  ".to_vec()]),
        ]);
        let client = BridgeClient::new(connector.clone());

        assert_eq!(client.submit(&open_alice()), Decision::Error);
        assert_eq!(client.submit(&open_alice()), Decision::Proceed);
        assert_eq!(connector.connects(), 2);
    }

    #[test]
    fn disconnect_closes_then_next_submit_reconnects() {
        let connector = ScriptedConnector::new(vec![
            Script::Replies(vec![b"0  ".to_vec()]),
            Script::Replies(vec![b"0  ".to_vec()]),
        ]);
        let client = BridgeClient::new(connector.clone());

        let bye = OperationDescriptor::disconnect("alice", "/srv");
        assert_eq!(client.submit(&bye), Decision::Proceed);
        assert_eq!(client.state(), ConnectionState::Disconnected);

        assert_eq!(client.submit(&OperationDescriptor::connect("alice", "/srv")), Decision::Proceed);
        assert_eq!(client.connect_count(), 2);
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[test]
    fn disconnect_closes_even_when_denied() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"-2 ".to_vec()])]);
        let client = BridgeClient::new(connector);

        let bye = OperationDescriptor::disconnect("alice", "/srv");
        assert_eq!(client.submit(&bye), Decision::Denied);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_with_garbled_reply_stays_connected() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"xy ".to_vec()])]);
        let client = BridgeClient::new(connector.clone());

        let bye = OperationDescriptor::disconnect("alice", "/srv");
        assert_eq!(client.submit(&bye), Decision::Error);
        // Only a parsed reply ends the session; the stream is still in frame sync.
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn repeated_submits_reuse_connection() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![
            b"0  ".to_vec(),
            b"0  ".to_vec(),
        ])]);
        let client = BridgeClient::new(connector.clone());

        assert_eq!(client.submit(&open_alice()), Decision::Proceed);
        assert_eq!(client.submit(&open_alice()), Decision::Proceed);
        assert_eq!(connector.connects(), 1);
        assert_eq!(client.messages_sent(), 2);
    }

    #[test]
    fn garbled_reply_is_protocol_error() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"xy ".to_vec()])]);
        let client = BridgeClient::new(connector);
        assert!(matches!(
            client.try_submit(&open_alice()),
            Err(BridgeError::Protocol { .. })
        ));
    }

    #[derive(Clone, Default)]
    struct MemorySink(Arc<StdMutex<Vec<MessageRecord>>>);

    impl MessageSink for MemorySink {
        fn record(&mut self, record: &MessageRecord) -> Result<(), MessageLogError> {
            self.0.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl MessageSink for BrokenSink {
        fn record(&mut self, _record: &MessageRecord) -> Result<(), MessageLogError> {
            Err(MessageLogError::WriteFailed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    #[test]
    fn sink_sees_message_and_decision() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"-2 ".to_vec()])]);
        let sink = MemorySink::default();
        let client = BridgeClient::new(connector).with_sink(sink.clone());
        let rename = OperationDescriptor::rename("bob", "/srv", "a.txt", "b.txt");

        client.submit(&rename);

        let records = sink.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message.as_deref(), Some("rename:bob:/srv:a.txt,b.txt"));
        assert_eq!(records[0].decision, Decision::Denied);
        assert_eq!(records[0].sequence, 1);
    }

    #[test]
    fn sink_failure_does_not_change_decision() {
        let connector = ScriptedConnector::new(vec![Script::Replies(vec![b"0  ".to_vec()])]);
        let client = BridgeClient::new(connector).with_sink(BrokenSink);
        assert_eq!(client.submit(&open_alice()), Decision::Proceed);
    }

    #[test]
    fn client_is_shareable_across_threads() {
        let replies = (0..8).map(|_| b"0  ".to_vec()).collect();
        let connector = ScriptedConnector::new(vec![Script::Replies(replies)]);
        let client = Arc::new(BridgeClient::new(connector.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = Arc::clone(&client);
                std::thread::spawn(move || client.submit(&open_alice()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Decision::Proceed);
        }
        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.bytes_written(), 8 * REQUEST_FRAME_SIZE);
    }
}
