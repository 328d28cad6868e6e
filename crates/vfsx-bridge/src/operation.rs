// operation.rs — Gated operation data model.
//
// An OperationDescriptor is what the interception layer hands the bridge
// before it performs a filesystem call: who is acting, in which session
// (origin path), on what target, and with which extra arguments. The
// descriptor is immutable once built and lives for exactly one `submit` call.

use std::fmt;

/// Name of a gated filesystem operation.
///
/// The named variants are the operations the interception layer gates today.
/// `Other` keeps the wire tag open for layers that gate more than that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Disconnect,
    Opendir,
    Mkdir,
    Rmdir,
    Open,
    Close,
    Read,
    Write,
    Pread,
    Pwrite,
    Lseek,
    Rename,
    Unlink,
    Other(String),
}

impl Operation {
    /// The wire tag for this operation (first field of the message).
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Opendir => "opendir",
            Operation::Mkdir => "mkdir",
            Operation::Rmdir => "rmdir",
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Pread => "pread",
            Operation::Pwrite => "pwrite",
            Operation::Lseek => "lseek",
            Operation::Rename => "rename",
            Operation::Unlink => "unlink",
            Operation::Other(name) => name,
        }
    }

    /// Parse a wire tag. Unknown tags become `Other`.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "connect" => Operation::Connect,
            "disconnect" => Operation::Disconnect,
            "opendir" => Operation::Opendir,
            "mkdir" => Operation::Mkdir,
            "rmdir" => Operation::Rmdir,
            "open" => Operation::Open,
            "close" => Operation::Close,
            "read" => Operation::Read,
            "write" => Operation::Write,
            "pread" => Operation::Pread,
            "pwrite" => Operation::Pwrite,
            "lseek" => Operation::Lseek,
            "rename" => Operation::Rename,
            "unlink" => Operation::Unlink,
            other => Operation::Other(other.to_string()),
        }
    }

    /// Whether a successful round trip for this operation ends the connection.
    pub fn closes_connection(&self) -> bool {
        matches!(self, Operation::Disconnect)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An auxiliary argument: a numeric flag/mode or a secondary path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Number(i64),
    Path(String),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Number(n) => write!(f, "{}", n),
            Arg::Path(p) => f.write_str(p),
        }
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Number(n)
    }
}

impl From<u32> for Arg {
    fn from(n: u32) -> Self {
        Arg::Number(i64::from(n))
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Number(i64::from(n))
    }
}

impl From<&str> for Arg {
    fn from(p: &str) -> Self {
        Arg::Path(p.to_string())
    }
}

impl From<String> for Arg {
    fn from(p: String) -> Self {
        Arg::Path(p)
    }
}

/// Everything the decision service needs to judge one gated operation.
///
/// Fields are private so a descriptor cannot change between encoding and
/// the close-after check in the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    operation: Operation,
    user: String,
    origin: String,
    target: Option<String>,
    args: Vec<Arg>,
}

impl OperationDescriptor {
    /// Start a descriptor with no target and no arguments.
    pub fn new(operation: Operation, user: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            operation,
            user: user.into(),
            origin: origin.into(),
            target: None,
            args: Vec::new(),
        }
    }

    /// Set the primary target path (builder).
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Append an auxiliary argument (builder).
    pub fn with_arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn connect(user: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::new(Operation::Connect, user, origin)
    }

    /// Session teardown. A successful round trip closes the bridge connection.
    pub fn disconnect(user: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::new(Operation::Disconnect, user, origin)
    }

    pub fn mkdir(
        user: impl Into<String>,
        origin: impl Into<String>,
        path: impl Into<String>,
        mode: u32,
    ) -> Self {
        Self::new(Operation::Mkdir, user, origin)
            .with_target(path)
            .with_arg(mode)
    }

    /// Open with the raw `flags` and `mode` the caller passed to open(2).
    pub fn open(
        user: impl Into<String>,
        origin: impl Into<String>,
        path: impl Into<String>,
        flags: i32,
        mode: u32,
    ) -> Self {
        Self::new(Operation::Open, user, origin)
            .with_target(path)
            .with_arg(flags)
            .with_arg(mode)
    }

    pub fn rename(
        user: impl Into<String>,
        origin: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::new(Operation::Rename, user, origin)
            .with_target(from)
            .with_arg(Arg::Path(to.into()))
    }

    /// Any operation whose only argument is the target path
    /// (opendir, rmdir, close, read, write, unlink, ...).
    pub fn on_path(
        operation: Operation,
        user: impl Into<String>,
        origin: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(operation, user, origin).with_target(path)
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}
