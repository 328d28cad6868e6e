// transport.rs — How the bridge obtains a byte stream to the decision service.
//
// The Connection Manager is generic over `Connector` so production code dials
// a Unix socket while tests plug in scripted in-memory streams.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opens a fresh stream to the decision service.
///
/// One call is one connect attempt; retry policy belongs to the caller.
pub trait Connector {
    type Stream: Read + Write;

    fn connect(&self) -> io::Result<Self::Stream>;

    /// Rendezvous address, for error messages and logs.
    fn endpoint(&self) -> &Path;
}

/// Dials the decision service's Unix stream socket.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
    io_timeout: Option<Duration>,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_timeout: None,
        }
    }

    /// Apply a read and write timeout to every stream this connector opens.
    ///
    /// A zero duration is treated as "no timeout" rather than passed to the
    /// socket, which rejects it.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }
}

impl Connector for UnixConnector {
    type Stream = UnixStream;

    fn connect(&self) -> io::Result<UnixStream> {
        let stream = match self.io_timeout {
            Some(timeout) => connect_bounded(&self.path, timeout)?,
            None => UnixStream::connect(&self.path)?,
        };
        stream.set_read_timeout(self.io_timeout)?;
        stream.set_write_timeout(self.io_timeout)?;
        Ok(stream)
    }

    fn endpoint(&self) -> &Path {
        &self.path
    }
}

/// Connect with the send timeout already set on the socket.
///
/// Linux bounds a blocking AF_UNIX connect (which only waits while the
/// listener's backlog is full) by SO_SNDTIMEO and reports expiry as EAGAIN.
/// `UnixStream::connect` gives no way to set it first, hence the raw calls.
#[cfg(target_os = "linux")]
fn connect_bounded(path: &Path, timeout: Duration) -> io::Result<UnixStream> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::io::{AsRawFd, FromRawFd};

    let bytes = path.as_os_str().as_bytes();
    // SAFETY: sockaddr_un is plain data and all-zero is a valid value.
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    if bytes.len() >= addr.sun_path.len() || bytes.contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path too long or contains NUL",
        ));
    }
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    for (dst, &src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = src as libc::c_char;
    }

    // SAFETY: plain socket(2); ownership of the fd passes to `stream` at once.
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` is a freshly created socket owned by nothing else.
    let stream = unsafe { UnixStream::from_raw_fd(fd) };
    stream.set_write_timeout(Some(timeout))?;

    let len = std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
    // SAFETY: `addr` is a valid, NUL-terminated sockaddr_un of `len` bytes.
    let rc = unsafe {
        libc::connect(
            stream.as_raw_fd(),
            &addr as *const libc::sockaddr_un as *const libc::sockaddr,
            len,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stream)
}

#[cfg(not(target_os = "linux"))]
fn connect_bounded(path: &Path, _timeout: Duration) -> io::Result<UnixStream> {
    UnixStream::connect(path)
}
