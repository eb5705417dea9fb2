//! The blocking socket core (`spec.md` §4.1): one OS handle, optionally
//! TLS-wrapped, with read buffering, HTTP framing primitives, and
//! per-operation event/warning accounting. [`HttpClient`](crate::http_client::HttpClient)
//! and [`FtpClient`](crate::ftp_client::FtpClient) are both built
//! entirely on top of this module's public surface.

pub mod buffer;
pub mod error;
pub mod events;
pub mod http;
pub mod tls;

use buffer::ReadBuffer;
pub use error::{SocketError, SocketErrorKind};
pub use events::{Event, EventKind, EventSink, Warning, WarningSink};

use native_tls::{Identity, TlsStream};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// The address family a socket was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Inet,
    Inet6,
    Unix,
    Unspec,
}

/// A positive timeout means "deadline in milliseconds"; `0` means "poll,
/// don't wait"; negative means "wait forever" — the convention `spec.md`
/// uses throughout for every `timeoutMs` parameter.
fn duration_for(timeout_ms: i64) -> Option<Duration> {
    if timeout_ms < 0 {
        None
    } else if timeout_ms == 0 {
        Some(Duration::from_micros(1))
    } else {
        Some(Duration::from_millis(timeout_ms as u64))
    }
}

enum Transport {
    Closed,
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    TlsTcp(Box<TlsStream<TcpStream>>),
    #[cfg(unix)]
    TlsUnix(Box<TlsStream<UnixStream>>),
}

impl Transport {
    fn is_open(&self) -> bool {
        !matches!(self, Transport::Closed)
    }

    fn set_timeouts(&self, timeout_ms: i64) -> io::Result<()> {
        let dur = duration_for(timeout_ms);
        match self {
            Transport::Closed => Ok(()),
            Transport::Tcp(s) => {
                s.set_read_timeout(dur)?;
                s.set_write_timeout(dur)
            }
            #[cfg(unix)]
            Transport::Unix(s) => {
                s.set_read_timeout(dur)?;
                s.set_write_timeout(dur)
            }
            Transport::TlsTcp(s) => {
                let inner = s.get_ref();
                inner.set_read_timeout(dur)?;
                inner.set_write_timeout(dur)
            }
            #[cfg(unix)]
            Transport::TlsUnix(s) => {
                let inner = s.get_ref();
                inner.set_read_timeout(dur)?;
                inner.set_write_timeout(dur)
            }
        }
    }

    fn shutdown(&self) {
        match self {
            Transport::Closed => {}
            Transport::Tcp(s) => {
                let _ = s.shutdown(Shutdown::Both);
            }
            #[cfg(unix)]
            Transport::Unix(s) => {
                let _ = s.shutdown(Shutdown::Both);
            }
            Transport::TlsTcp(s) => {
                let _ = s.get_ref().shutdown(Shutdown::Both);
            }
            #[cfg(unix)]
            Transport::TlsUnix(s) => {
                let _ = s.get_ref().shutdown(Shutdown::Both);
            }
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Closed => Err(io::Error::new(io::ErrorKind::NotConnected, "socket not open")),
            Transport::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Transport::Unix(s) => s.read(buf),
            Transport::TlsTcp(s) => s.read(buf),
            #[cfg(unix)]
            Transport::TlsUnix(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Closed => Err(io::Error::new(io::ErrorKind::NotConnected, "socket not open")),
            Transport::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Transport::Unix(s) => s.write(buf),
            Transport::TlsTcp(s) => s.write(buf),
            #[cfg(unix)]
            Transport::TlsUnix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Closed => Ok(()),
            Transport::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Transport::Unix(s) => s.flush(),
            Transport::TlsTcp(s) => s.flush(),
            #[cfg(unix)]
            Transport::TlsUnix(s) => s.flush(),
        }
    }
}

/// Monotonically increasing socket ids, used as the event queue's `id`
/// field (`spec.md` §4.1) so a consumer can correlate events from the
/// same socket without this crate depending on a UUID-capable embedder.
static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// The reentrancy interlock from `spec.md` §5 ("inOperation... forbid
/// reentrancy except from the same callback"). Cheap enough to check on
/// every blocking entry point; cleared on drop.
struct OpGuard<'a> {
    owner: &'a std::sync::Mutex<Option<ThreadId>>,
    acquired: bool,
}

impl<'a> OpGuard<'a> {
    fn enter(owner: &'a std::sync::Mutex<Option<ThreadId>>) -> Result<Self, SocketError> {
        let mut slot = owner.lock().expect("socket op-guard mutex poisoned");
        let current = std::thread::current().id();
        match *slot {
            None => {
                *slot = Some(current);
                Ok(OpGuard { owner, acquired: true })
            }
            Some(holder) if holder == current => Err(SocketErrorKind::InOp.into()),
            Some(_) => Err(SocketErrorKind::InOpThread.into()),
        }
    }
}

impl<'a> Drop for OpGuard<'a> {
    fn drop(&mut self) {
        if self.acquired {
            *self.owner.lock().expect("socket op-guard mutex poisoned") = None;
        }
    }
}

/// Cumulative byte/time accounting used to raise throughput warnings.
#[derive(Debug, Default, Clone, Copy)]
struct Throughput {
    bytes: u64,
    micros: u64,
}

/// One blocking, optionally-TLS-wrapped socket. See the module
/// documentation and `spec.md` §3/§4.1 for the full contract.
pub struct Socket {
    id: u64,
    transport: Transport,
    family: Family,
    local_port: Option<u16>,
    unix_path: Option<PathBuf>,
    owns_unix_path: bool,
    buffer: ReadBuffer,
    pending_chunked_body: bool,
    event_queue: Option<EventSink>,
    warning_queue: Option<WarningSink>,
    warning_arg: Option<String>,
    warning_threshold_us: u64,
    warning_threshold_bps: f64,
    min_event_us: u64,
    recv_throughput: Throughput,
    send_throughput: Throughput,
    op_guard: std::sync::Mutex<Option<ThreadId>>,
}

impl Socket {
    /// A closed socket with default settings, per `spec.md`'s `Socket.new()`.
    pub fn new() -> Self {
        Socket {
            id: NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed),
            transport: Transport::Closed,
            family: Family::Unspec,
            local_port: None,
            unix_path: None,
            owns_unix_path: false,
            buffer: ReadBuffer::new(),
            pending_chunked_body: false,
            event_queue: None,
            warning_queue: None,
            warning_arg: None,
            warning_threshold_us: 0,
            warning_threshold_bps: 0.0,
            min_event_us: 0,
            recv_throughput: Throughput::default(),
            send_throughput: Throughput::default(),
            op_guard: std::sync::Mutex::new(None),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// The local address of the underlying TCP connection, used by
    /// `FtpClient`'s `PORT` mode to discover "the control connection's own
    /// local IPv4 address" per `spec.md`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.transport {
            Transport::Tcp(s) => s.local_addr().ok(),
            Transport::TlsTcp(s) => s.get_ref().local_addr().ok(),
            _ => None,
        }
    }

    /// Wrap an already-connected plain TCP stream as an open `Socket`,
    /// used by `FtpClient`'s `PORT` mode after `accept`-ing the
    /// server-initiated data connection.
    pub(crate) fn from_tcp_stream(stream: TcpStream) -> Socket {
        let family = match stream.local_addr() {
            Ok(SocketAddr::V6(_)) => Family::Inet6,
            _ => Family::Inet,
        };
        let local_port = stream.local_addr().ok().map(|a| a.port());
        Socket {
            id: NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed),
            transport: Transport::Tcp(stream),
            family,
            local_port,
            unix_path: None,
            owns_unix_path: false,
            buffer: ReadBuffer::new(),
            pending_chunked_body: false,
            event_queue: None,
            warning_queue: None,
            warning_arg: None,
            warning_threshold_us: 0,
            warning_threshold_bps: 0.0,
            min_event_us: 0,
            recv_throughput: Throughput::default(),
            send_throughput: Throughput::default(),
            op_guard: std::sync::Mutex::new(None),
        }
    }

    pub fn set_event_queue(&mut self, sink: Option<EventSink>) {
        self.event_queue = sink;
    }

    pub fn set_warning_queue(&mut self, sink: Option<WarningSink>, threshold_us: u64, threshold_bps: f64, min_event_us: u64, arg: Option<String>) {
        self.warning_queue = sink;
        self.warning_threshold_us = threshold_us;
        self.warning_threshold_bps = threshold_bps;
        self.min_event_us = min_event_us;
        self.warning_arg = arg;
    }

    fn emit(&self, kind: EventKind, fields: &[(&str, String)]) {
        if let Some(sink) = &self.event_queue {
            let mut ev = Event::new(kind, 0, self.id);
            for (k, v) in fields {
                ev = ev.with(k, v.clone());
            }
            sink(ev);
        }
    }

    fn check_timeout_warning(&self, started: Instant) {
        if self.warning_threshold_us == 0 {
            return;
        }
        let elapsed_us = started.elapsed().as_micros() as u64;
        if elapsed_us > self.warning_threshold_us {
            if let Some(sink) = &self.warning_queue {
                sink(
                    Warning::Timeout { measured_us: elapsed_us, threshold_us: self.warning_threshold_us },
                    self.warning_arg.clone(),
                );
            }
        }
    }

    fn check_throughput_warning(&self, t: &Throughput) {
        if self.warning_threshold_bps <= 0.0 || t.bytes < 1024 || t.micros as u64 == 0 {
            return;
        }
        if (t.micros as u64) < self.min_event_us {
            return;
        }
        let bps = (t.bytes as f64) / (t.micros as f64 / 1_000_000.0);
        if bps < self.warning_threshold_bps {
            if let Some(sink) = &self.warning_queue {
                sink(
                    Warning::Throughput { bytes_per_sec: bps, threshold_bps: self.warning_threshold_bps },
                    self.warning_arg.clone(),
                );
            }
        }
    }

    /// Tear down TLS (if any), unlink an owned UNIX path, reset the
    /// buffer and cached port, emit `channel-closed`. Idempotent.
    pub fn close(&mut self) {
        if !self.transport.is_open() {
            return;
        }
        self.transport.shutdown();
        self.transport = Transport::Closed;
        if self.owns_unix_path {
            if let Some(path) = &self.unix_path {
                let _ = std::fs::remove_file(path);
            }
        }
        self.unix_path = None;
        self.owns_unix_path = false;
        self.local_port = None;
        self.buffer = ReadBuffer::new();
        self.pending_chunked_body = false;
        self.emit(EventKind::ChannelClosed, &[]);
    }

    // ---- connect ----------------------------------------------------

    /// Resolve `host:service` and connect, trying each address in turn
    /// (`spec.md`: "iterates addresses trying connect... exhaustion
    /// reports the last error").
    pub fn connect_inet(&mut self, host: &str, port: u16, timeout_ms: i64) -> Result<(), SocketError> {
        self.close();
        self.emit(EventKind::HostnameLookup, &[("host", host.to_string())]);

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| SocketError::from(SocketErrorKind::ConnectError(e.to_string())))?
            .collect();
        if addrs.is_empty() {
            return Err(SocketErrorKind::ConnectError(format!("no addresses for {}", host)).into());
        }
        for addr in &addrs {
            self.emit(EventKind::HostnameResolved, &[("address", addr.to_string())]);
        }

        let deadline = duration_for(timeout_ms);
        let mut last_err = None;
        for addr in &addrs {
            self.emit(EventKind::Connecting, &[("address", addr.to_string())]);
            let attempt = match deadline {
                Some(d) => TcpStream::connect_timeout(addr, d),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    self.family = match addr {
                        SocketAddr::V4(_) => Family::Inet,
                        SocketAddr::V6(_) => Family::Inet6,
                    };
                    self.local_port = stream.local_addr().ok().map(|a| a.port());
                    self.transport = Transport::Tcp(stream);
                    self.emit(EventKind::Connected, &[("address", addr.to_string())]);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(SocketErrorKind::ConnectError(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "connection failed".to_string()),
        )
        .into())
    }

    /// Connect to a UNIX-domain socket at `path`.
    #[cfg(unix)]
    pub fn connect_unix(&mut self, path: impl AsRef<Path>, timeout_ms: i64) -> Result<(), SocketError> {
        self.close();
        let _ = timeout_ms; // UnixStream::connect has no timed variant in std; the OS call itself doesn't block for local sockets.
        self.emit(EventKind::Connecting, &[("path", path.as_ref().display().to_string())]);
        let stream = UnixStream::connect(path.as_ref()).map_err(|e| SocketError::from(SocketErrorKind::ConnectError(e.to_string())))?;
        self.family = Family::Unix;
        self.unix_path = Some(path.as_ref().to_path_buf());
        self.transport = Transport::Unix(stream);
        self.emit(EventKind::Connected, &[("path", path.as_ref().display().to_string())]);
        Ok(())
    }

    // ---- TLS ----------------------------------------------------------

    /// Upgrade an already-connected socket to TLS as a client
    /// (`spec.md`'s `upgradeClientToTls`).
    pub fn upgrade_client_to_tls(&mut self, domain: &str, identity: Option<Identity>, timeout_ms: i64) -> Result<(), SocketError> {
        self.transport.set_timeouts(timeout_ms).map_err(SocketError::from)?;
        self.emit(EventKind::StartTls, &[]);
        let connector = tls::build_connector(identity)?;
        let transport = std::mem::replace(&mut self.transport, Transport::Closed);
        self.transport = match transport {
            Transport::Tcp(s) => Transport::TlsTcp(Box::new(tls::handshake_client(&connector, domain, s)?)),
            #[cfg(unix)]
            Transport::Unix(s) => Transport::TlsUnix(Box::new(tls::handshake_client(&connector, domain, s)?)),
            Transport::Closed => return Err(SocketErrorKind::NotOpen("upgradeClientToTls").into()),
            other => {
                self.transport = other;
                return Err(SocketErrorKind::SslError("socket is already TLS-wrapped".to_string()).into());
            }
        };
        self.emit(EventKind::TlsEstablished, &[]);
        Ok(())
    }

    /// Upgrade an already-accepted socket to TLS as a server
    /// (`spec.md`'s `upgradeServerToTls`).
    pub fn upgrade_server_to_tls(&mut self, identity: Identity, timeout_ms: i64) -> Result<(), SocketError> {
        self.transport.set_timeouts(timeout_ms).map_err(SocketError::from)?;
        self.emit(EventKind::StartTls, &[]);
        let acceptor = tls::build_acceptor(identity)?;
        let transport = std::mem::replace(&mut self.transport, Transport::Closed);
        self.transport = match transport {
            Transport::Tcp(s) => Transport::TlsTcp(Box::new(tls::handshake_server(&acceptor, s)?)),
            #[cfg(unix)]
            Transport::Unix(s) => Transport::TlsUnix(Box::new(tls::handshake_server(&acceptor, s)?)),
            Transport::Closed => return Err(SocketErrorKind::NotOpen("upgradeServerToTls").into()),
            other => {
                self.transport = other;
                return Err(SocketErrorKind::SslError("socket is already TLS-wrapped".to_string()).into());
            }
        };
        self.emit(EventKind::TlsEstablished, &[]);
        Ok(())
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.transport, Transport::TlsTcp(_)) || {
            #[cfg(unix)]
            {
                matches!(self.transport, Transport::TlsUnix(_))
            }
            #[cfg(not(unix))]
            {
                false
            }
        }
    }

    // ---- buffered receive ---------------------------------------------

    /// `spec.md`'s `brecv`: bytes already buffered first, else one
    /// underlying read of up to `max_len`. An empty result means the
    /// peer closed the connection (and this socket is closed in turn).
    pub fn brecv(&mut self, max_len: usize, timeout_ms: i64) -> Result<Vec<u8>, SocketError> {
        let _guard = OpGuard::enter(&self.op_guard)?;
        if !self.transport.is_open() {
            return Err(SocketErrorKind::NotOpen("brecv").into());
        }

        if !self.buffer.is_empty() {
            let mut out = Vec::new();
            self.buffer.take(&mut out, max_len);
            return Ok(out);
        }

        self.transport.set_timeouts(timeout_ms).map_err(SocketError::from)?;
        let started = Instant::now();
        let spare = self.buffer.spare_capacity_mut();
        let cap = spare.len().min(max_len.max(1));
        let n = match self.transport.read(&mut spare[..cap]) {
            Ok(n) => n,
            Err(e) => return Err(SocketError::from(e)),
        };
        self.check_timeout_warning(started);
        if n == 0 {
            self.close();
            return Ok(Vec::new());
        }
        self.recv_throughput.bytes += n as u64;
        self.recv_throughput.micros += started.elapsed().as_micros() as u64;
        self.check_throughput_warning(&self.recv_throughput);
        self.buffer.fill(n);
        let mut out = Vec::new();
        self.buffer.take(&mut out, max_len);
        Ok(out)
    }

    /// `recv(byteLen, timeoutMs)`: read exactly `byte_len` bytes (looping
    /// until satisfied, or the peer closes early).
    pub fn recv(&mut self, byte_len: usize, timeout_ms: i64) -> Result<String, SocketError> {
        let bytes = self.recv_binary(byte_len, timeout_ms)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// `recv(timeoutMs)`: block for the first packet, then drain
    /// whatever else is immediately available with a 0-ms timeout.
    pub fn recv_available(&mut self, timeout_ms: i64) -> Result<String, SocketError> {
        let mut out = self.brecv(self.buffer.capacity(), timeout_ms)?;
        loop {
            let more = self.brecv(self.buffer.capacity(), 0)?;
            if more.is_empty() {
                break;
            }
            out.extend_from_slice(&more);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn recv_binary(&mut self, byte_len: usize, timeout_ms: i64) -> Result<Vec<u8>, SocketError> {
        let mut out = Vec::with_capacity(byte_len);
        while out.len() < byte_len {
            let chunk = self.brecv(byte_len - out.len(), timeout_ms)?;
            if chunk.is_empty() {
                return Err(SocketErrorKind::Closed(String::from_utf8_lossy(&out).into_owned()).into());
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Read exactly `byte_len` bytes (1, 2, 4 or 8) and decode as a
    /// big-endian integer.
    pub fn recv_fixed_integer_be(&mut self, byte_len: usize, timeout_ms: i64) -> Result<u64, SocketError> {
        let bytes = self.recv_binary(byte_len, timeout_ms)?;
        Ok(bytes_to_u64(&bytes, false))
    }

    /// As [`Self::recv_fixed_integer_be`] but little-endian.
    pub fn recv_fixed_integer_le(&mut self, byte_len: usize, timeout_ms: i64) -> Result<u64, SocketError> {
        let bytes = self.recv_binary(byte_len, timeout_ms)?;
        Ok(bytes_to_u64(&bytes, true))
    }

    /// Pump up to `byte_len` bytes into `sink`, emitting a `packet-read`
    /// event per chunk.
    pub fn recv_to_stream(&mut self, sink: &mut dyn Write, byte_len: usize, timeout_ms: i64) -> Result<u64, SocketError> {
        let mut total_read = 0u64;
        while total_read < byte_len as u64 {
            let remaining = byte_len as u64 - total_read;
            let chunk = self.brecv(remaining.min(self.buffer.capacity() as u64) as usize, timeout_ms)?;
            if chunk.is_empty() {
                break;
            }
            sink.write_all(&chunk).map_err(SocketError::from)?;
            total_read += chunk.len() as u64;
            self.emit(
                EventKind::PacketRead,
                &[
                    ("read", chunk.len().to_string()),
                    ("total_read", total_read.to_string()),
                    ("total_to_read", byte_len.to_string()),
                ],
            );
        }
        Ok(total_read)
    }

    // ---- send -----------------------------------------------------------

    /// `send(bytes, len, timeoutMs)`: write in a loop, accounting partial
    /// writes, emitting `packet-sent` per chunk written.
    pub fn send(&mut self, bytes: &[u8], timeout_ms: i64) -> Result<usize, SocketError> {
        let _guard = OpGuard::enter(&self.op_guard)?;
        if !self.transport.is_open() {
            return Err(SocketErrorKind::NotOpen("send").into());
        }
        self.transport.set_timeouts(timeout_ms).map_err(SocketError::from)?;

        let started = Instant::now();
        let mut total = 0usize;
        while total < bytes.len() {
            let n = match self.transport.write(&bytes[total..]) {
                Ok(n) => n,
                Err(e) => return Err(SocketError::from(e)),
            };
            if n == 0 {
                return Err(SocketErrorKind::Closed(String::new()).into());
            }
            total += n;
            self.send_throughput.bytes += n as u64;
            self.emit(EventKind::PacketSent, &[("sent", n.to_string()), ("total_sent", total.to_string())]);
        }
        let _ = self.transport.flush();
        self.send_throughput.micros += started.elapsed().as_micros() as u64;
        self.check_timeout_warning(started);
        self.check_throughput_warning(&self.send_throughput);
        Ok(total)
    }

    pub fn send_fixed_integer_be(&mut self, value: u64, byte_len: usize, timeout_ms: i64) -> Result<usize, SocketError> {
        let bytes = u64_to_bytes(value, byte_len, false);
        self.send(&bytes, timeout_ms)
    }

    pub fn send_fixed_integer_le(&mut self, value: u64, byte_len: usize, timeout_ms: i64) -> Result<usize, SocketError> {
        let bytes = u64_to_bytes(value, byte_len, true);
        self.send(&bytes, timeout_ms)
    }

    /// Pull from `source` until EOF or `byte_len` bytes, writing each
    /// chunk straight through.
    pub fn send_from_stream(&mut self, source: &mut dyn Read, byte_len: Option<u64>, timeout_ms: i64) -> Result<u64, SocketError> {
        let mut buf = vec![0u8; self.buffer.capacity()];
        let mut total = 0u64;
        loop {
            if let Some(limit) = byte_len {
                if total >= limit {
                    break;
                }
            }
            let want = byte_len.map(|limit| (limit - total).min(buf.len() as u64) as usize).unwrap_or(buf.len());
            let n = source.read(&mut buf[..want]).map_err(SocketError::from)?;
            if n == 0 {
                break;
            }
            self.send(&buf[..n], timeout_ms)?;
            total += n as u64;
        }
        Ok(total)
    }

    // ---- HTTP framing ---------------------------------------------------

    pub fn read_http_header_string(&mut self, timeout_ms: i64) -> Result<String, SocketError> {
        let _guard = OpGuard::enter(&self.op_guard)?;
        http::read_http_header_string(self, timeout_ms)
    }

    pub fn read_http_header(&mut self, timeout_ms: i64, is_response: bool) -> Result<http::ParsedHeader, SocketError> {
        let raw = self.read_http_header_string(timeout_ms)?;
        let parsed = http::parse_http_header(&raw, is_response)?;
        self.pending_chunked_body = parsed.chunked;
        self.emit(EventKind::HttpMessageReceived, &[]);
        Ok(parsed)
    }

    pub fn send_http_message(
        &mut self,
        request_line: &str,
        headers: &crate::value::Dict,
        body: Option<&[u8]>,
        chunked: bool,
        timeout_ms: i64,
    ) -> Result<(), SocketError> {
        let content_length = body.map(|b| b.len() as u64);
        let head = http::build_message_head(request_line, headers, content_length, chunked);
        self.emit(EventKind::HttpSendMessage, &[("request_line", request_line.to_string())]);
        self.send(&head, timeout_ms)?;
        if let Some(body) = body {
            if !chunked {
                self.send(body, timeout_ms)?;
            }
        }
        Ok(())
    }

    pub fn read_http_chunked_body(&mut self, timeout_ms: i64, sink: http::ChunkSink) -> Result<(Option<Vec<u8>>, crate::value::Dict), SocketError> {
        let _guard = OpGuard::enter(&self.op_guard)?;
        self.emit(EventKind::HttpChunkedStart, &[]);
        let result = http::read_http_chunked_body(self, timeout_ms, sink)?;
        self.pending_chunked_body = false;
        self.emit(EventKind::HttpChunkedEnd, &[]);
        Ok(result)
    }

    pub fn send_http_chunked_with_callback(
        &mut self,
        timeout_ms: i64,
        cb: impl FnMut() -> Result<http::ChunkWriteResult, SocketError>,
        probe_for_unexpected_data: bool,
    ) -> Result<(), SocketError> {
        let _guard = OpGuard::enter(&self.op_guard)?;
        http::send_http_chunked_with_callback(self, timeout_ms, cb, probe_for_unexpected_data)
    }

    /// A zero-byte read attempt used by the chunked writer's abort probe:
    /// any bytes already sitting in `readBuffer`, or a momentary
    /// zero-timeout peek at the transport, count as "unexpected data
    /// arrived early".
    pub fn has_unexpected_data(&mut self) -> Result<bool, SocketError> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        if !self.transport.is_open() {
            return Ok(false);
        }
        let chunk = self.brecv(1, 0)?;
        if chunk.is_empty() {
            return Ok(false);
        }
        http::Framed::push_back(self, chunk);
        Ok(true)
    }
}

impl Default for Socket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}

impl http::Framed for Socket {
    fn recv_chunk(&mut self, timeout_ms: i64) -> Result<Vec<u8>, SocketError> {
        if !self.buffer.is_empty() {
            let mut out = Vec::new();
            self.buffer.take(&mut out, self.buffer.available());
            return Ok(out);
        }
        if !self.transport.is_open() {
            return Err(SocketErrorKind::NotOpen("recv_chunk").into());
        }
        self.transport.set_timeouts(timeout_ms).map_err(SocketError::from)?;
        let spare = self.buffer.spare_capacity_mut();
        let n = match self.transport.read(spare) {
            Ok(n) => n,
            Err(e) => return Err(SocketError::from(e)),
        };
        if n == 0 {
            self.close();
            return Ok(Vec::new());
        }
        self.buffer.fill(n);
        let mut out = Vec::new();
        self.buffer.take(&mut out, self.buffer.available());
        Ok(out)
    }

    fn push_back(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let mut merged = data;
        let mut rest = Vec::new();
        self.buffer.take(&mut rest, self.buffer.available());
        merged.extend_from_slice(&rest);
        let spare = self.buffer.spare_capacity_mut();
        let n = merged.len().min(spare.len());
        spare[..n].copy_from_slice(&merged[..n]);
        self.buffer.fill(n);
    }

    fn send_all(&mut self, data: &[u8], timeout_ms: i64) -> Result<(), SocketError> {
        self.send(data, timeout_ms).map(|_| ())
    }

    fn emit(&self, kind: EventKind, fields: &[(&str, String)]) {
        Socket::emit(self, kind, fields)
    }

    fn has_unexpected_data(&mut self) -> Result<bool, SocketError> {
        Socket::has_unexpected_data(self)
    }
}

fn bytes_to_u64(bytes: &[u8], little_endian: bool) -> u64 {
    let mut value = 0u64;
    if little_endian {
        for (i, b) in bytes.iter().enumerate() {
            value |= (*b as u64) << (8 * i);
        }
    } else {
        for b in bytes {
            value = (value << 8) | (*b as u64);
        }
    }
    value
}

fn u64_to_bytes(value: u64, byte_len: usize, little_endian: bool) -> Vec<u8> {
    let mut out = vec![0u8; byte_len];
    if little_endian {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (value >> (8 * i)) as u8;
        }
    } else {
        for (i, slot) in out.iter_mut().rev().enumerate() {
            *slot = (value >> (8 * i)) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn connect_inet_reaches_a_loopback_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"hi").unwrap();
        });

        let mut socket = Socket::new();
        socket.connect_inet("127.0.0.1", addr.port(), 1000).unwrap();
        let received = socket.recv(2, 1000).unwrap();
        assert_eq!(received, "hi");
        handle.join().unwrap();
    }

    #[test]
    fn brecv_on_remote_close_returns_empty_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut socket = Socket::new();
        socket.connect_inet("127.0.0.1", addr.port(), 1000).unwrap();
        let result = socket.brecv(16, 1000).unwrap();
        assert!(result.is_empty());
        assert!(!socket.is_open());
        handle.join().unwrap();
    }

    #[test]
    fn reentrant_call_from_same_thread_is_rejected() {
        let guard_owner = std::sync::Mutex::new(None);
        let _outer = OpGuard::enter(&guard_owner).unwrap();
        let inner = OpGuard::enter(&guard_owner);
        assert!(matches!(inner.unwrap_err().kind(), SocketErrorKind::InOp));
    }

    #[test]
    fn fixed_integer_round_trips_big_and_little_endian() {
        assert_eq!(bytes_to_u64(&[0x00, 0x01], false), 1);
        assert_eq!(bytes_to_u64(&[0x01, 0x00], true), 1);
        assert_eq!(u64_to_bytes(256, 2, false), vec![0x01, 0x00]);
        assert_eq!(u64_to_bytes(256, 2, true), vec![0x00, 0x01]);
    }
}
