//! Error kinds raised by [`super::HttpClient`], named in `spec.md` §6.

use crate::socket::SocketError;
use crate::url::UrlError;
use failure::{Backtrace, Context, Fail};
use std::fmt;

#[derive(Debug)]
pub struct HttpClientError {
    inner: Context<HttpClientErrorKind>,
}

impl HttpClientError {
    pub fn kind(&self) -> &HttpClientErrorKind {
        self.inner.get_context()
    }
}

impl Fail for HttpClientError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for HttpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<HttpClientErrorKind> for HttpClientError {
    fn from(kind: HttpClientErrorKind) -> Self {
        HttpClientError { inner: Context::new(kind) }
    }
}

impl From<SocketError> for HttpClientError {
    fn from(err: SocketError) -> Self {
        HttpClientErrorKind::Socket(err.to_string()).into()
    }
}

impl From<UrlError> for HttpClientError {
    fn from(err: UrlError) -> Self {
        HttpClientErrorKind::Url(err.to_string()).into()
    }
}

#[derive(Debug, Clone, Fail, PartialEq, Eq)]
pub enum HttpClientErrorKind {
    #[fail(display = "HTTP-CLIENT-URL-ERROR: {}", _0)]
    Url(String),
    #[fail(display = "HTTP-CLIENT-OPTION-ERROR: {}", _0)]
    Option(String),
    #[fail(display = "HTTP-CLIENT-UNKNOWN-PROTOCOL: {}", _0)]
    UnknownProtocol(String),
    #[fail(display = "HTTP-CLIENT-PROXY-PROTOCOL-ERROR: {}", _0)]
    ProxyProtocol(String),
    #[fail(display = "HTTP-CLIENT-METHOD-ERROR: {}", _0)]
    Method(String),
    #[fail(display = "HTTP-CLIENT-REDIRECT-ERROR: {}", _0)]
    Redirect(String),
    #[fail(display = "HTTP-CLIENT-MAXIMUM-REDIRECTS-EXCEEDED: {} redirects", _0)]
    MaximumRedirectsExceeded(u32),
    #[fail(display = "HTTP-CLIENT-RECEIVE-ERROR: {}", _0)]
    Receive(String),
    #[fail(display = "HTTP-HEADER-ERROR: {}", _0)]
    Header(String),
    #[fail(display = "HTTP-VERSION-ERROR: {}", _0)]
    Version(String),
    #[fail(display = "PERSISTENCE-ERROR: {}", _0)]
    Persistence(String),
    #[fail(display = "{}", _0)]
    Socket(String),
}
