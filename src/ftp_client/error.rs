//! Error kinds raised by [`super::FtpClient`], named in `spec.md` §6.

use crate::socket::SocketError;
use crate::url::UrlError;
use failure::{Backtrace, Context, Fail};
use std::fmt;

#[derive(Debug)]
pub struct FtpClientError {
    inner: Context<FtpClientErrorKind>,
}

impl FtpClientError {
    pub fn kind(&self) -> &FtpClientErrorKind {
        self.inner.get_context()
    }
}

impl Fail for FtpClientError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for FtpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<FtpClientErrorKind> for FtpClientError {
    fn from(kind: FtpClientErrorKind) -> Self {
        FtpClientError { inner: Context::new(kind) }
    }
}

impl From<SocketError> for FtpClientError {
    fn from(err: SocketError) -> Self {
        FtpClientErrorKind::Receive(err.to_string()).into()
    }
}

impl From<UrlError> for FtpClientError {
    fn from(err: UrlError) -> Self {
        FtpClientErrorKind::Url(err.to_string()).into()
    }
}

impl From<std::io::Error> for FtpClientError {
    fn from(err: std::io::Error) -> Self {
        FtpClientErrorKind::FileOpen(err.to_string()).into()
    }
}

#[derive(Debug, Clone, Fail, PartialEq, Eq)]
pub enum FtpClientErrorKind {
    #[fail(display = "FTP-URL-ERROR: {}", _0)]
    Url(String),
    #[fail(display = "FTP-CONNECT-ERROR: {}", _0)]
    Connect(String),
    #[fail(display = "FTP-LOGIN-ERROR: {}", _0)]
    Login(String),
    #[fail(display = "FTP-RECEIVE-ERROR: {}", _0)]
    Receive(String),
    #[fail(display = "FTP-SEND-ERROR: {}", _0)]
    Send(String),
    #[fail(display = "FTP-LIST-ERROR: {}", _0)]
    List(String),
    #[fail(display = "FTP-GET-ERROR: {}", _0)]
    Get(String),
    #[fail(display = "FTP-PUT-ERROR: {}", _0)]
    Put(String),
    #[fail(display = "FTP-GETASSTRING-ERROR: {}", _0)]
    GetAsString(String),
    #[fail(display = "FTP-GETASBINARY-ERROR: {}", _0)]
    GetAsBinary(String),
    #[fail(display = "FTP-RESPONSE-ERROR: {}", _0)]
    Response(String),
    #[fail(display = "FTP-FILE-OPEN-ERROR: {}", _0)]
    FileOpen(String),
    #[fail(display = "FTP-FILE-PUT-ERROR: {}", _0)]
    FilePut(String),
    #[fail(display = "FTP-RENAME-ERROR: {}", _0)]
    Rename(String),
    #[fail(display = "FTP-CWD-ERROR: {}", _0)]
    Cwd(String),
    #[fail(display = "FTP-PWD-ERROR: {}", _0)]
    Pwd(String),
    #[fail(display = "FTP-DELETE-ERROR: {}", _0)]
    Delete(String),
    #[fail(display = "FTP-MKDIR-ERROR: {}", _0)]
    Mkdir(String),
    #[fail(display = "FTP-RMDIR-ERROR: {}", _0)]
    Rmdir(String),
    #[fail(display = "FTPS-AUTH-ERROR: {}", _0)]
    FtpsAuth(String),
    #[fail(display = "FTPS-SECURE-DATA-ERROR: {}", _0)]
    FtpsSecureData(String),
    #[fail(display = "UNSUPPORTED-PROTOCOL: {}", _0)]
    UnsupportedProtocol(String),
}
