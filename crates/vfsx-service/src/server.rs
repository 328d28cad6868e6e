// server.rs — Listener loop for the decision service.
//
// A bridge holds one long-lived connection per interception process and sends
// fixed-size request frames over it until it says "disconnect" or goes away.
// The server accepts on the rendezvous socket and gives every connection its
// own thread; all threads share one Dispatcher and therefore one session table.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};
use vfsx_bridge::protocol::REQUEST_FRAME_SIZE;

use crate::error::ServiceError;
use crate::handler::{DecisionHandler, Dispatcher};
use crate::request::encode_response;

/// A bound rendezvous socket plus the dispatcher that answers on it.
///
/// The socket file is removed when the server is dropped, unless another
/// server has bound the same path since.
pub struct Server {
    listener: UnixListener,
    path: PathBuf,
    /// (device, inode) of the socket file this server created.
    socket_id: (u64, u64),
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Bind the rendezvous socket at `path`.
    ///
    /// A socket file left behind by an earlier run is removed first. Any other
    /// kind of file at that path is left alone and binding fails.
    pub fn bind(
        path: impl Into<PathBuf>,
        handler: impl DecisionHandler + 'static,
    ) -> Result<Self, ServiceError> {
        let path = path.into();
        remove_stale_socket(&path).map_err(|source| ServiceError::Bind {
            path: path.clone(),
            source,
        })?;

        let listener = UnixListener::bind(&path).map_err(|source| ServiceError::Bind {
            path: path.clone(),
            source,
        })?;
        let socket_id = socket_file_id(&path).map_err(|source| ServiceError::Bind {
            path: path.clone(),
            source,
        })?;
        info!(socket = %path.display(), "decision service listening");

        Ok(Self {
            listener,
            path,
            socket_id,
            dispatcher: Arc::new(Dispatcher::new(handler)),
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Accept connections forever, one thread each.
    ///
    /// A failed accept is logged and skipped. Returns only if a worker thread
    /// cannot be spawned.
    pub fn serve(&self) -> Result<(), ServiceError> {
        for (id, stream) in self.listener.incoming().enumerate() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let dispatcher = Arc::clone(&self.dispatcher);
            thread::Builder::new()
                .name(format!("vfsx-conn-{}", id))
                .spawn(move || {
                    debug!(conn = id, "connection accepted");
                    match serve_connection(stream, &dispatcher) {
                        Ok(frames) => debug!(conn = id, frames, "connection closed"),
                        Err(e) => warn!(conn = id, error = %e, "connection ended with error"),
                    }
                })?;
        }
        Ok(())
    }

    /// Accept a single connection and serve it on the calling thread.
    ///
    /// Returns the number of requests answered.
    pub fn serve_one(&self) -> Result<u64, ServiceError> {
        let (stream, _) = self.listener.accept()?;
        serve_connection(stream, &self.dispatcher)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        match socket_file_id(&self.path) {
            Ok(id) if id == self.socket_id => {}
            Ok(_) => {
                debug!(socket = %self.path.display(), "socket path rebound elsewhere, leaving it");
                return;
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(socket = %self.path.display(), error = %e, "could not inspect socket");
                }
                return;
            }
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(socket = %self.path.display(), error = %e, "could not remove socket");
            }
        }
    }
}

fn socket_file_id(path: &Path) -> io::Result<(u64, u64)> {
    let meta = fs::symlink_metadata(path)?;
    Ok((meta.dev(), meta.ino()))
}

/// Answer request frames on one stream until the peer hangs up.
///
/// A clean EOF between frames ends the loop normally. EOF in the middle of a
/// frame, or any read/write failure, ends it with an error. Returns the number
/// of requests answered.
pub fn serve_connection<S: Read + Write>(
    mut stream: S,
    dispatcher: &Dispatcher,
) -> Result<u64, ServiceError> {
    let mut frame = [0u8; REQUEST_FRAME_SIZE];
    let mut answered = 0u64;

    while read_frame(&mut stream, &mut frame)? {
        let code = dispatcher.dispatch(&frame);
        let response = encode_response(code).unwrap_or_else(|e| {
            warn!(error = %e, "handler returned an unencodable code");
            // FAIL_ERROR always fits.
            *b"-1 "
        });
        stream.write_all(&response)?;
        stream.flush()?;
        answered += 1;
    }
    Ok(answered)
}

/// Fill `frame` from the stream. `Ok(false)` means the peer closed cleanly
/// before the first byte of a frame.
fn read_frame<S: Read>(stream: &mut S, frame: &mut [u8]) -> Result<bool, ServiceError> {
    let mut filled = 0;
    while filled < frame.len() {
        match stream.read(&mut frame[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(ServiceError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("peer closed after {} of {} bytes", filled, frame.len()),
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(socket = %path.display(), "removing stale socket");
            fs::remove_file(path)
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists and is not a socket",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
