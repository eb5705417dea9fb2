//! TLS session setup for [`super::Socket::upgrade_client_to_tls`] and
//! [`super::Socket::upgrade_server_to_tls`] (`spec.md` §4, "TLS upgrade").
//!
//! Built on `native-tls` rather than `rustls`: `libunftp`'s own
//! `server/tls.rs` carries a comment explaining they moved off
//! `rustls`/`tokio-rustls` after dependency conflicts and kept the rustls
//! path only as a commented-out fallback. This crate has no tokio to
//! conflict with, but there's no reason to reintroduce the dependency
//! that was abandoned for cause, so it follows the same choice.
//!
//! `native-tls::TlsConnector::connect`/`TlsAcceptor::accept` block on the
//! underlying stream's own blocking/timeout semantics, so the handshake
//! "loop" `spec.md` describes in terms of `WANT_READ`/`WANT_WRITE` falls
//! out of `set_read_timeout`/`set_write_timeout` on the socket below
//! without this module driving a state machine by hand.

use crate::socket::error::{SocketError, SocketErrorKind};
use native_tls::{HandshakeError, Identity, TlsAcceptor, TlsConnector};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// A loaded client certificate + private key, installed on a connector or
/// acceptor before the handshake starts (`spec.md`'s `cert`/`key`
/// parameters to `upgradeClientToTls`/`upgradeServerToTls`).
pub fn load_identity<P: AsRef<Path>>(pkcs12_file: P, password: &str) -> Result<Identity, SocketError> {
    let mut file = File::open(pkcs12_file).map_err(SocketError::from)?;
    let mut der = Vec::new();
    file.read_to_end(&mut der).map_err(SocketError::from)?;
    Identity::from_pkcs12(&der, password).map_err(SocketError::from)
}

/// Build a connector for `upgradeClientToTls`. Non-goal per `spec.md`:
/// "arbitrary TLS client-certificate chains beyond one cert + one key", so
/// `identity` carries at most one.
pub fn build_connector(identity: Option<Identity>) -> Result<TlsConnector, SocketError> {
    let mut builder = TlsConnector::builder();
    if let Some(identity) = identity {
        builder.identity(identity);
    }
    builder.build().map_err(SocketError::from)
}

/// Build an acceptor for `upgradeServerToTls`. A server-side upgrade
/// always needs an identity (there is no anonymous server handshake).
pub fn build_acceptor(identity: Identity) -> Result<TlsAcceptor, SocketError> {
    TlsAcceptor::new(identity).map_err(SocketError::from)
}

/// Drive the client handshake to completion, translating the handshake's
/// own error cases onto the stable socket error kinds from `spec.md` §6.
///
/// `domain` is used for SNI and certificate hostname verification; pass
/// the connection's `host` field.
pub fn handshake_client<S: Read + Write>(
    connector: &TlsConnector,
    domain: &str,
    stream: S,
) -> Result<native_tls::TlsStream<S>, SocketError> {
    match connector.connect(domain, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(err)) => Err(SocketError::from(err)),
        // The underlying stream is blocking with read/write timeouts
        // installed by the caller, so a `WouldBlock` here means the
        // kernel timeout fired mid-handshake rather than a genuine
        // retry-me-later signal: the session is unusable either way.
        Err(HandshakeError::WouldBlock(_)) => Err(SocketErrorKind::Timeout.into()),
    }
}

/// Drive the server-side handshake to completion.
pub fn handshake_server<S: Read + Write>(
    acceptor: &TlsAcceptor,
    stream: S,
) -> Result<native_tls::TlsStream<S>, SocketError> {
    match acceptor.accept(stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(err)) => Err(SocketError::from(err)),
        Err(HandshakeError::WouldBlock(_)) => Err(SocketErrorKind::Timeout.into()),
    }
}

/// Best-effort description of the negotiated session for the
/// `tls-established` event. `native-tls` doesn't expose the negotiated
/// cipher suite or protocol version uniformly across its three backends
/// (OpenSSL / SChannel / Secure Transport), so this is deliberately vague
/// rather than wrong.
pub fn session_description<S>(_tls: &native_tls::TlsStream<S>) -> String {
    "tls".to_string()
}
