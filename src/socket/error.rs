//! The `Socket` error type and the stable error-kind strings from
//! `spec.md` §6 ("Exposed error kinds").
//!
//! Mirrors `libunftp`'s `ControlChanError`/storage `Error`: a thin struct
//! wrapping a `failure::Context<SocketErrorKind>` so callers can match on
//! `.kind()` while `Display` gives a human-readable message and
//! `to_string()`/`kind().code()` gives the stable wire string.

use failure::{Backtrace, Context, Fail};
use std::fmt;
use std::io;

/// Error raised by any [`crate::socket::Socket`] operation.
#[derive(Debug)]
pub struct SocketError {
    inner: Context<SocketErrorKind>,
}

impl SocketError {
    /// The structured kind of this error.
    pub fn kind(&self) -> &SocketErrorKind {
        self.inner.get_context()
    }

    /// Construct directly from a kind.
    pub fn new(kind: SocketErrorKind) -> Self {
        SocketError { inner: Context::new(kind) }
    }
}

impl Fail for SocketError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<SocketErrorKind> for SocketError {
    fn from(kind: SocketErrorKind) -> SocketError {
        SocketError { inner: Context::new(kind) }
    }
}

impl From<Context<SocketErrorKind>> for SocketError {
    fn from(inner: Context<SocketErrorKind>) -> SocketError {
        SocketError { inner }
    }
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> SocketError {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SocketErrorKind::Timeout.into(),
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => {
                err.context(SocketErrorKind::Closed(err.to_string())).into()
            }
            _ => err.context(SocketErrorKind::Io(err.raw_os_error(), err.to_string())).into(),
        }
    }
}

impl From<native_tls::Error> for SocketError {
    fn from(err: native_tls::Error) -> SocketError {
        err.to_string().into()
    }
}

impl From<String> for SocketError {
    fn from(msg: String) -> SocketError {
        SocketErrorKind::SslError(msg).into()
    }
}

/// The stable error kinds exposed by the socket layer. `Display` emits
/// exactly the wire string named in `spec.md` §6 so `err.kind().to_string()`
/// is the stable error key a caller would switch on.
#[derive(Debug, Clone, Fail, PartialEq, Eq)]
pub enum SocketErrorKind {
    #[fail(display = "SOCKET-NOT-OPEN: {}", _0)]
    NotOpen(&'static str),
    #[fail(display = "SOCKET-CLOSED: {}", _0)]
    Closed(String),
    #[fail(display = "SOCKET-IN-CALLBACK: operation attempted reentrantly from the same thread")]
    InCallback,
    #[fail(display = "SOCKET-TIMEOUT")]
    Timeout,
    #[fail(display = "SOCKET-CONNECT-ERROR: {}", _0)]
    ConnectError(String),
    #[fail(display = "SOCKET-BIND-ERROR: {}", _0)]
    BindError(String),
    #[fail(display = "SOCKET-ACCEPT-ERROR: {}", _0)]
    AcceptError(String),
    #[fail(display = "SOCKET-RECV-ERROR: {}", _0)]
    RecvError(String),
    #[fail(display = "SOCKET-SEND-ERROR: {}", _0)]
    SendError(String),
    #[fail(display = "SOCKET-SELECT-ERROR: {}", _0)]
    SelectError(String),
    #[fail(display = "SOCKET-SSL-ERROR: {}", _0)]
    SslError(String),
    #[fail(display = "SOCKET-HTTP-ERROR: {}", _0)]
    HttpError(String),
    #[fail(display = "SOCKET-CALLBACK-ERROR: {}", _0)]
    CallbackError(String),
    #[fail(display = "SOCKET-SETWARNINGQUEUE-ERROR: {}", _0)]
    SetWarningQueueError(String),
    #[fail(display = "READ-HTTP-CHUNK-ERROR: {}", _0)]
    ReadHttpChunkError(String),
    #[fail(display = "SOCKET-IO-ERROR: {:?}: {}", _0, _1)]
    Io(Option<i32>, String),
    #[fail(display = "SOCKET-INVALID-FAMILY: {}", _0)]
    InvalidFamily(String),
    /// Per §5: a second call on the same socket from a *different* thread
    /// while a long operation is already running.
    #[fail(display = "SOCKET-IN-OP-THREAD: another thread is already performing a blocking operation on this socket")]
    InOpThread,
    /// Per §5: a reentrant call from the *same* thread (e.g. a send
    /// callback calling back into the socket it was invoked from).
    #[fail(display = "SOCKET-IN-OP: this thread is already performing a blocking operation on this socket")]
    InOp,
}

impl SocketErrorKind {
    /// The stable error-key string from `spec.md` §6, without the detail
    /// suffix — useful for callers that want to match on the kind alone.
    pub fn code(&self) -> &'static str {
        match self {
            SocketErrorKind::NotOpen(_) => "SOCKET-NOT-OPEN",
            SocketErrorKind::Closed(_) => "SOCKET-CLOSED",
            SocketErrorKind::InCallback => "SOCKET-IN-CALLBACK",
            SocketErrorKind::Timeout => "SOCKET-TIMEOUT",
            SocketErrorKind::ConnectError(_) => "SOCKET-CONNECT-ERROR",
            SocketErrorKind::BindError(_) => "SOCKET-BIND-ERROR",
            SocketErrorKind::AcceptError(_) => "SOCKET-ACCEPT-ERROR",
            SocketErrorKind::RecvError(_) => "SOCKET-RECV-ERROR",
            SocketErrorKind::SendError(_) => "SOCKET-SEND-ERROR",
            SocketErrorKind::SelectError(_) => "SOCKET-SELECT-ERROR",
            SocketErrorKind::SslError(_) => "SOCKET-SSL-ERROR",
            SocketErrorKind::HttpError(_) => "SOCKET-HTTP-ERROR",
            SocketErrorKind::CallbackError(_) => "SOCKET-CALLBACK-ERROR",
            SocketErrorKind::SetWarningQueueError(_) => "SOCKET-SETWARNINGQUEUE-ERROR",
            SocketErrorKind::ReadHttpChunkError(_) => "READ-HTTP-CHUNK-ERROR",
            SocketErrorKind::Io(_, _) => "SOCKET-IO-ERROR",
            SocketErrorKind::InvalidFamily(_) => "SOCKET-INVALID-FAMILY",
            SocketErrorKind::InOpThread => "SOCKET-IN-OP-THREAD",
            SocketErrorKind::InOp => "SOCKET-IN-OP",
        }
    }
}
