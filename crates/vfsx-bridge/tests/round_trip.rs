// round_trip.rs — The bridge against a real Unix socket.
//
// Each test binds a throwaway rendezvous socket in a temp directory and runs a
// tiny decision service on a thread. The service reads 512-byte frames,
// answers each with a 3-byte code, and reports back every message it saw,
// grouped per accepted connection.

use std::io::{Read, Write};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use tempfile::tempdir;

use vfsx_bridge::protocol::REQUEST_FRAME_SIZE;
use vfsx_bridge::{
    BridgeClient, BridgeConfig, BridgeError, ConnectionState, Decision, MessageLog, Operation,
    OperationDescriptor,
};

/// Serve `connections` connections one after another, answering each request
/// with `reply(message)`.
fn spawn_service(
    path: &Path,
    connections: usize,
    reply: fn(&str) -> &'static [u8; 3],
) -> JoinHandle<Vec<Vec<String>>> {
    let listener = UnixListener::bind(path).unwrap();
    thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().unwrap();
            let mut messages = Vec::new();
            let mut frame = [0u8; REQUEST_FRAME_SIZE];
            while stream.read_exact(&mut frame).is_ok() {
                let end = frame.iter().position(|&b| b == 0).unwrap();
                let text = String::from_utf8(frame[..end].to_vec()).unwrap();
                stream.write_all(reply(&text)).unwrap();
                messages.push(text);
            }
            seen.push(messages);
        }
        seen
    })
}

fn allow_all(_: &str) -> &'static [u8; 3] {
    b"0  "
}

#[test]
fn open_is_allowed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfsx.sock");
    let service = spawn_service(&path, 1, allow_all);

    let client = BridgeClient::from_config(&BridgeConfig::for_socket(&path));
    let open = OperationDescriptor::open("alice", "/srv", "file.txt", 0, 0o644);
    assert_eq!(client.submit(&open), Decision::Proceed);
    assert_eq!(client.state(), ConnectionState::Connected);
    drop(client);

    let seen = service.join().unwrap();
    assert_eq!(seen, vec![vec!["open:alice:/srv:file.txt,0,420".to_string()]]);
}

#[test]
fn rename_is_denied() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfsx.sock");
    let service = spawn_service(&path, 1, |msg| {
        if msg.starts_with("rename:") {
            b"-2 "
        } else {
            b"0  "
        }
    });

    let client = BridgeClient::from_config(&BridgeConfig::for_socket(&path));
    let rename = OperationDescriptor::rename("alice", "/srv", "a.txt", "b.txt");
    assert_eq!(client.submit(&rename), Decision::Denied);
    assert_eq!(Decision::Denied.into_io_result().unwrap_err().kind(), std::io::ErrorKind::PermissionDenied);

    // A denial does not cost the connection.
    let read = OperationDescriptor::on_path(Operation::Read, "alice", "/srv", "a.txt");
    assert_eq!(client.submit(&read), Decision::Proceed);
    assert_eq!(client.connect_count(), 1);
    drop(client);

    let seen = service.join().unwrap();
    assert_eq!(seen[0], vec!["rename:alice:/srv:a.txt,b.txt", "read:alice:/srv:a.txt"]);
}

#[test]
fn disconnect_closes_and_next_call_reconnects() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfsx.sock");
    let service = spawn_service(&path, 2, allow_all);

    let client = BridgeClient::from_config(&BridgeConfig::for_socket(&path));
    assert_eq!(client.submit(&OperationDescriptor::connect("alice", "/srv")), Decision::Proceed);
    assert_eq!(client.submit(&OperationDescriptor::disconnect("alice", "/srv")), Decision::Proceed);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let mkdir = OperationDescriptor::mkdir("alice", "/srv", "newdir", 0o755);
    assert_eq!(client.submit(&mkdir), Decision::Proceed);
    assert_eq!(client.connect_count(), 2);
    drop(client);

    let seen = service.join().unwrap();
    assert_eq!(
        seen,
        vec![
            vec!["connect:alice:/srv".to_string(), "disconnect:alice:/srv".to_string()],
            vec!["mkdir:alice:/srv:newdir,493".to_string()],
        ]
    );
}

#[test]
fn threads_share_one_connection() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfsx.sock");
    let service = spawn_service(&path, 1, allow_all);

    let client = Arc::new(BridgeClient::from_config(&BridgeConfig::for_socket(&path)));
    let workers: Vec<_> = (0..4)
        .map(|t| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..10 {
                    let target = format!("t{}-{}", t, i);
                    let d = OperationDescriptor::on_path(Operation::Unlink, "alice", "/srv", target);
                    assert_eq!(client.submit(&d), Decision::Proceed);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(client.messages_sent(), 40);
    assert_eq!(client.connect_count(), 1);
    drop(client);

    let seen = service.join().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 40);
}

#[test]
fn silent_service_times_out() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfsx.sock");
    let listener = UnixListener::bind(&path).unwrap();
    let (release, wait) = mpsc::channel::<()>();
    let service = thread::spawn(move || {
        let (_stream, _) = listener.accept().unwrap();
        // Hold the connection open without answering.
        let _ = wait.recv();
    });

    let config = BridgeConfig {
        io_timeout_ms: 200,
        ..BridgeConfig::for_socket(&path)
    };
    let client = BridgeClient::from_config(&config);
    let result = client.try_submit(&OperationDescriptor::connect("alice", "/srv"));
    assert!(matches!(result, Err(BridgeError::Timeout { .. })));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    release.send(()).unwrap();
    service.join().unwrap();
}

#[test]
fn missing_service_is_an_error() {
    let dir = tempdir().unwrap();
    let client = BridgeClient::from_config(&BridgeConfig::for_socket(dir.path().join("absent.sock")));

    let connect = OperationDescriptor::connect("alice", "/srv");
    assert!(matches!(client.try_submit(&connect), Err(BridgeError::Connection { .. })));
    assert_eq!(client.submit(&connect), Decision::Error);
    assert_eq!(client.messages_sent(), 0);
}

#[test]
fn message_log_records_each_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfsx.sock");
    let log_path = dir.path().join("messages.jsonl");
    let service = spawn_service(&path, 1, |msg| {
        if msg.starts_with("unlink:") {
            b"-2 "
        } else {
            b"0  "
        }
    });

    let config = BridgeConfig {
        message_log: Some(log_path.clone()),
        ..BridgeConfig::for_socket(&path)
    };
    let client = BridgeClient::from_config(&config);
    client.submit(&OperationDescriptor::connect("alice", "/srv"));
    client.submit(&OperationDescriptor::on_path(Operation::Unlink, "alice", "/srv", "x"));
    drop(client);
    service.join().unwrap();

    let records = MessageLog::read_all(&log_path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message.as_deref(), Some("connect:alice:/srv"));
    assert_eq!(records[0].decision, Decision::Proceed);
    assert_eq!(records[1].decision, Decision::Denied);
    assert_eq!(records[1].sequence, 2);
}
