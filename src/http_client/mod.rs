//! An HTTP/1.1 client built on [`crate::socket::Socket`] (`spec.md` §4.2).
//!
//! One `HttpClient` drives one connection at a time: request assembly,
//! redirect following, proxy/`CONNECT` tunnelling, and response decoding.
//! The generic `Value`/`Dict` surface `spec.md` describes for `setOptions`
//! is replaced here with explicit builder methods, since this crate has
//! no embedding-language value system to dispatch on (see [`crate::value`]).

pub mod error;

pub use error::{HttpClientError, HttpClientErrorKind};

use crate::socket::http::{ChunkSink, ChunkWriteResult};
use crate::socket::{Socket, SocketErrorKind};
use crate::url::UrlParts;
use crate::value::{dict_get_ci, dict_set, Dict};
use base64;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Either side of a connection or a configured proxy (`spec.md`'s
/// `ConnectionInfo`).
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub ssl: bool,
    pub is_unix: bool,
}

impl ConnectionInfo {
    fn from_url(url: &UrlParts, protocol_map: &HashMap<String, ProtocolEntry>) -> Result<Self, HttpClientError> {
        if url.user.is_some() != url.pass.is_some() {
            return Err(HttpClientErrorKind::Url("username given without a password, or vice versa".to_string()).into());
        }
        let entry = protocol_map
            .get(&url.scheme)
            .ok_or_else(|| HttpClientErrorKind::UnknownProtocol(url.scheme.clone()))?;
        Ok(ConnectionInfo {
            host: url.host.clone(),
            port: url.port.unwrap_or(entry.port),
            path: url.path.clone(),
            user: url.user.clone(),
            pass: url.pass.clone(),
            ssl: entry.ssl,
            is_unix: url.is_unix,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ProtocolEntry {
    port: u16,
    ssl: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    fn as_str(self) -> &'static str {
        match self {
            HttpVersion::Http10 => "1.0",
            HttpVersion::Http11 => "1.1",
        }
    }
}

/// The body half of a request: nothing, a fixed byte slice, or a
/// callback streamed as chunked transfer encoding.
pub enum RequestBody<'a> {
    None,
    Bytes(&'a [u8]),
    Callback(&'a mut dyn FnMut() -> Result<ChunkWriteResult, crate::socket::SocketError>),
}

/// Where response body bytes should land.
pub enum ResponseSink<'a> {
    /// Accumulate into [`HttpResponse::body`].
    Buffer,
    /// Pipe straight into a writer.
    Stream(&'a mut dyn Write),
    /// Deliver each chunk to a callback; `HttpResponse::body` stays `None`.
    Callback(&'a mut dyn FnMut(&[u8])),
}

/// The assembled result of one request/response exchange.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status_code: u32,
    pub status_message: String,
    pub headers: Dict,
    pub body: Option<Vec<u8>>,
}

/// Registers a body decompressor for one `Content-Encoding` token.
/// `spec.md` treats the actual codecs (deflate/gzip/bzip2) as an external
/// collaborator (`Decoder: Blob -> String`); this crate exposes the
/// lookup and lets the caller install whichever codec crates it has.
pub type Decoder = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync>;

const IGNORED_REQUEST_HEADERS: &[&str] = &["content-length"];

/// The methods the built-in table recognises out of the box (`spec.md`
/// §4.2 step 1); additional ones may be registered via
/// [`HttpClient::register_method`].
const BUILTIN_METHODS_NO_BODY: &[&str] = &["OPTIONS", "GET", "HEAD", "DELETE", "TRACE", "CONNECT"];
const BUILTIN_METHODS_WITH_BODY: &[&str] = &["POST", "PUT"];

pub struct HttpClient {
    socket: Socket,
    http_version: HttpVersion,
    connection: ConnectionInfo,
    proxy_connection: Option<ConnectionInfo>,
    protocol_map: HashMap<String, ProtocolEntry>,
    default_headers: Dict,
    additional_methods: HashMap<String, bool>,
    default_path: String,
    max_redirects: u32,
    default_request_timeout_ms: i64,
    connect_timeout_ms: i64,
    decoders: HashMap<String, Decoder>,
    connected: bool,
    proxy_tunnel_established: bool,
    persistent: bool,
}

impl HttpClient {
    pub fn new() -> Self {
        let mut protocol_map = HashMap::new();
        protocol_map.insert("http".to_string(), ProtocolEntry { port: 80, ssl: false });
        protocol_map.insert("https".to_string(), ProtocolEntry { port: 443, ssl: true });

        let mut default_headers = Dict::new();
        dict_set(&mut default_headers, "Accept", "text/html");
        dict_set(&mut default_headers, "Accept-Encoding", "deflate,gzip,bzip2");
        dict_set(&mut default_headers, "Connection", "Keep-Alive");
        dict_set(&mut default_headers, "User-Agent", "netcore-http-client/0.1");

        HttpClient {
            socket: Socket::new(),
            http_version: HttpVersion::Http11,
            connection: ConnectionInfo::default(),
            proxy_connection: None,
            protocol_map,
            default_headers,
            additional_methods: HashMap::new(),
            default_path: "/".to_string(),
            max_redirects: 5,
            default_request_timeout_ms: 30_000,
            connect_timeout_ms: -1,
            decoders: HashMap::new(),
            connected: false,
            proxy_tunnel_established: false,
            persistent: false,
        }
    }

    // ---- options --------------------------------------------------------

    pub fn register_protocol(&mut self, scheme: &str, port: u16, ssl: bool) {
        self.protocol_map.insert(scheme.to_ascii_lowercase(), ProtocolEntry { port, ssl });
    }

    pub fn set_max_redirects(&mut self, n: u32) {
        self.max_redirects = n;
    }

    pub fn set_default_path(&mut self, path: impl Into<String>) {
        self.default_path = path.into();
    }

    pub fn set_http_version(&mut self, version: &str) -> Result<(), HttpClientError> {
        self.http_version = match version {
            "1.0" => HttpVersion::Http10,
            "1.1" => HttpVersion::Http11,
            other => return Err(HttpClientErrorKind::Version(format!("unsupported HTTP version: {}", other)).into()),
        };
        Ok(())
    }

    pub fn set_default_request_timeout_ms(&mut self, timeout_ms: i64) {
        self.default_request_timeout_ms = timeout_ms;
    }

    pub fn set_connect_timeout_ms(&mut self, timeout_ms: i64) {
        self.connect_timeout_ms = timeout_ms;
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub fn register_method(&mut self, name: &str, has_body: bool) {
        self.additional_methods.insert(name.to_ascii_uppercase(), has_body);
    }

    pub fn register_decoder(&mut self, content_encoding: &str, decoder: Decoder) {
        self.decoders.insert(content_encoding.to_ascii_lowercase(), decoder);
    }

    pub fn set_event_queue(&mut self, sink: Option<crate::socket::EventSink>) {
        self.socket.set_event_queue(sink);
    }

    pub fn set_proxy(&mut self, url: &str) -> Result<(), HttpClientError> {
        let parts = UrlParts::parse(url)?;
        self.proxy_connection = Some(ConnectionInfo::from_url(&parts, &self.protocol_map)?);
        Ok(())
    }

    /// Apply a new URL, closing the socket unless a proxy tunnel is
    /// already established (`spec.md`'s `ConnectionInfo` invariant: "a
    /// non-proxy URL change immediately closes the socket; a URL change
    /// under a proxy does not").
    pub fn set_url(&mut self, url: &str) -> Result<(), HttpClientError> {
        let parts = UrlParts::parse(url)?;
        let mut connection = ConnectionInfo::from_url(&parts, &self.protocol_map)?;
        if connection.path.is_none() {
            connection.path = self.connection.path.clone();
        }
        self.connection = connection;
        if self.proxy_connection.is_none() || !self.proxy_tunnel_established {
            self.disconnect();
        }
        Ok(())
    }

    /// Apply a redirect `Location`: an absolute URL goes through
    /// [`Self::set_url`]; an absolute- or relative-path-only value keeps
    /// the current host/port/scheme and only replaces the path, resolving
    /// a relative path against the current path's directory.
    fn apply_redirect_location(&mut self, location: &str) -> Result<(), HttpClientError> {
        if location.contains("://") {
            return self.set_url(location);
        }
        let path = if location.starts_with('/') {
            location.to_string()
        } else {
            let current = self.connection.path.clone().unwrap_or_else(|| "/".to_string());
            let dir = match current.rfind('/') {
                Some(idx) => &current[..=idx],
                None => "/",
            };
            format!("{}{}", dir, location)
        };
        self.connection.path = Some(path);
        if self.proxy_connection.is_none() || !self.proxy_tunnel_established {
            self.disconnect();
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.socket.close();
        self.connected = false;
        self.proxy_tunnel_established = false;
    }

    fn effective_ssl(&self) -> bool {
        self.connection.ssl
    }

    fn method_has_body(&self, method: &str) -> Result<bool, HttpClientError> {
        let upper = method.to_ascii_uppercase();
        if BUILTIN_METHODS_WITH_BODY.contains(&upper.as_str()) {
            return Ok(true);
        }
        if BUILTIN_METHODS_NO_BODY.contains(&upper.as_str()) {
            return Ok(false);
        }
        self.additional_methods
            .get(&upper)
            .copied()
            .ok_or_else(|| HttpClientErrorKind::Method(format!("unknown method: {}", method)).into())
    }

    fn connect_if_needed(&mut self) -> Result<(), HttpClientError> {
        if self.socket.is_open() {
            return Ok(());
        }
        if self.persistent {
            return Err(HttpClientErrorKind::Persistence("socket disconnected but client is persistent".to_string()).into());
        }
        // A non-tunnelled proxy (plain-http target) is connected to
        // directly; the target itself is only ever named in the
        // absolute-URI request line `message_path` builds.
        if let Some(proxy) = self.proxy_connection.clone().filter(|_| !self.connection.ssl) {
            self.socket.connect_inet(&proxy.host, proxy.port, self.connect_timeout_ms)?;
            self.connected = true;
            return Ok(());
        }
        if self.connection.is_unix {
            #[cfg(unix)]
            {
                self.socket.connect_unix(&self.connection.host, self.connect_timeout_ms)?;
            }
            #[cfg(not(unix))]
            {
                return Err(HttpClientErrorKind::Url("UNIX sockets are not supported on this platform".to_string()).into());
            }
        } else {
            self.socket.connect_inet(&self.connection.host, self.connection.port, self.connect_timeout_ms)?;
        }
        if self.effective_ssl() {
            self.socket.upgrade_client_to_tls(&self.connection.host, None, self.connect_timeout_ms)?;
        }
        self.connected = true;
        Ok(())
    }

    /// `getMsgPath`: `path` argument > `connection.path` > `defaultPath`
    /// > `/`, percent-encoding only spaces, and prefixed with the
    /// absolute-URI form when routed through a non-tunnelled proxy.
    fn message_path(&self, path_override: Option<&str>) -> String {
        let chosen = path_override
            .map(|s| s.to_string())
            .or_else(|| self.connection.path.clone())
            .unwrap_or_else(|| self.default_path.clone());
        let encoded = chosen.replace(' ', "%20");

        if self.proxy_connection.is_some() && !self.proxy_tunnel_established {
            let scheme = if self.connection.ssl { "https" } else { "http" };
            format!("{}://{}:{}{}", scheme, self.connection.host, self.connection.port, encoded)
        } else {
            encoded
        }
    }

    fn needs_connect_tunnel(&self) -> bool {
        self.proxy_connection.is_some() && self.connection.ssl && !self.proxy_tunnel_established
    }

    fn basic_auth(user: &str, pass: &str) -> String {
        format!("Basic {}", base64::encode(format!("{}:{}", user, pass)))
    }

    fn build_request_headers(&self, user_headers: &Dict, has_body: bool, has_send_callback: bool) -> (Dict, bool) {
        let mut headers = Dict::new();
        let mut saw_transfer_encoding = false;
        for (key, value) in user_headers.iter() {
            if IGNORED_REQUEST_HEADERS.contains(&key.as_str()) {
                continue;
            }
            if key.eq_ignore_ascii_case("transfer-encoding") {
                saw_transfer_encoding = true;
            }
            headers.insert(key.clone(), value.clone());
        }

        if !headers.contains_key("accept") {
            if let Some(v) = self.default_headers.get("Accept") {
                dict_set(&mut headers, "Accept", v.as_str());
            }
        }
        if (has_body || has_send_callback) && !headers.contains_key("content-type") {
            dict_set(&mut headers, "Content-Type", "text/html");
        }
        if !headers.contains_key("connection") && !headers.contains_key("proxy-connection") {
            if let Some(v) = self.default_headers.get("Connection") {
                dict_set(&mut headers, "Connection", v.as_str());
            }
        }
        if !headers.contains_key("user-agent") {
            if let Some(v) = self.default_headers.get("User-Agent") {
                dict_set(&mut headers, "User-Agent", v.as_str());
            }
        }
        if !headers.contains_key("accept-encoding") {
            if let Some(v) = self.default_headers.get("Accept-Encoding") {
                dict_set(&mut headers, "Accept-Encoding", v.as_str());
            }
        }
        if has_send_callback && !saw_transfer_encoding {
            dict_set(&mut headers, "Transfer-Encoding", "chunked");
            saw_transfer_encoding = true;
        }
        if !headers.contains_key("authorization") {
            if let (Some(user), Some(pass)) = (&self.connection.user, &self.connection.pass) {
                dict_set(&mut headers, "Authorization", Self::basic_auth(user, pass));
            }
        }
        // A non-tunnelled proxy (plain-http target): inject
        // `Proxy-Authorization` from the proxy's own credentials, unless
        // the caller already supplied one (`spec.md` §4.2 step 5).
        if !self.connection.ssl && !headers.contains_key("proxy-authorization") {
            if let Some(proxy) = &self.proxy_connection {
                if let (Some(user), Some(pass)) = (&proxy.user, &proxy.pass) {
                    dict_set(&mut headers, "Proxy-Authorization", Self::basic_auth(user, pass));
                }
            }
        }
        if !headers.contains_key("host") {
            dict_set(&mut headers, "Host", format!("{}:{}", self.connection.host, self.connection.port));
        }

        (headers, saw_transfer_encoding)
    }

    /// Perform the `CONNECT` tunnel handshake (`spec.md` §4.2 step 4).
    fn establish_connect_tunnel(&mut self) -> Result<(), HttpClientError> {
        let proxy = self.proxy_connection.clone().expect("needs_connect_tunnel implies a proxy is set");
        self.socket.connect_inet(&proxy.host, proxy.port, self.connect_timeout_ms)?;

        let mut tunnel_headers = Dict::new();
        dict_set(&mut tunnel_headers, "Host", format!("{}:{}", self.connection.host, self.connection.port));
        if let (Some(user), Some(pass)) = (&proxy.user, &proxy.pass) {
            dict_set(&mut tunnel_headers, "Proxy-Authorization", Self::basic_auth(user, pass));
        }

        let request_line = format!(
            "CONNECT {}:{} HTTP/{}",
            self.connection.host,
            self.connection.port,
            self.http_version.as_str()
        );
        self.socket.send_http_message(&request_line, &tunnel_headers, None, false, self.default_request_timeout_ms)?;

        let raw = self.socket.read_http_header_string(self.default_request_timeout_ms)?;
        let parsed = crate::socket::http::parse_http_header(&raw, true)?;
        let code = match parsed.first_line {
            crate::socket::http::FirstLine::Status { code, .. } => code,
            _ => return Err(HttpClientErrorKind::ProxyProtocol("malformed CONNECT response".to_string()).into()),
        };
        if !(200..300).contains(&code) {
            return Err(HttpClientErrorKind::ProxyProtocol(format!("proxy refused CONNECT: {}", code)).into());
        }

        self.socket.upgrade_client_to_tls(&self.connection.host, None, self.connect_timeout_ms)?;
        self.proxy_tunnel_established = true;
        self.connected = true;
        Ok(())
    }

    /// The core request/response exchange (`spec.md` §4.2, "Per-request
    /// flow"), including redirect following.
    pub fn send(
        &mut self,
        method: &str,
        path: Option<&str>,
        mut headers: Dict,
        mut body: RequestBody<'_>,
        mut info: Option<&mut Dict>,
        timeout_ms: Option<i64>,
        mut sink: ResponseSink<'_>,
    ) -> Result<HttpResponse, HttpClientError> {
        let has_body = self.method_has_body(&method.to_ascii_uppercase())?;
        let timeout_ms = timeout_ms.unwrap_or(self.default_request_timeout_ms);
        let mut current_path = path.map(|s| s.to_string());
        let mut redirects = 0u32;

        loop {
            if self.needs_connect_tunnel() {
                self.establish_connect_tunnel()?;
            } else {
                self.connect_if_needed()?;
            }

            let body_bytes = match &body {
                RequestBody::Bytes(b) => Some(*b),
                _ => None,
            };
            let has_send_callback = matches!(body, RequestBody::Callback(_));
            let (wire_headers, chunked) = self.build_request_headers(&headers, body_bytes.is_some(), has_send_callback);

            let msg_path = self.message_path(current_path.as_deref());
            let request_line = format!("{} {} HTTP/{}", method.to_ascii_uppercase(), msg_path, self.http_version.as_str());

            self.socket
                .send_http_message(&request_line, &wire_headers, body_bytes, chunked, timeout_ms)?;
            if let RequestBody::Callback(cb) = &mut body {
                self.socket.send_http_chunked_with_callback(timeout_ms, move || cb(), true)?;
            }

            let mut parsed = loop {
                let raw = self.socket.read_http_header_string(timeout_ms)?;
                let parsed = crate::socket::http::parse_http_header(&raw, true)?;
                let code = match parsed.first_line {
                    crate::socket::http::FirstLine::Status { code, .. } => code,
                    _ => return Err(HttpClientErrorKind::Receive("expected a status line".to_string()).into()),
                };
                if code == 100 {
                    continue; // 100-Continue: ignore and re-read
                }
                break parsed;
            };

            let (status_code, status_message) = match &parsed.first_line {
                crate::socket::http::FirstLine::Status { code, message, .. } => (*code, message.clone()),
                _ => unreachable!(),
            };

            if let Some(info) = info.as_deref_mut() {
                for (k, v) in parsed.headers.iter() {
                    info.insert(k.clone(), v.clone());
                }
            }

            if (300..400).contains(&status_code) {
                self.disconnect();
                let location = dict_get_ci(&parsed.headers, "location")
                    .map(|v| v.as_str())
                    .ok_or_else(|| HttpClientErrorKind::Redirect("redirect response missing Location".to_string()))?;
                redirects += 1;
                if redirects > self.max_redirects {
                    return Err(HttpClientErrorKind::MaximumRedirectsExceeded(self.max_redirects).into());
                }
                if let Some(info) = info.as_deref_mut() {
                    dict_set(info, format!("redirect-{}", redirects), location.clone());
                    dict_set(info, format!("redirect-message-{}", redirects), status_message.clone());
                }
                self.apply_redirect_location(&location)?;
                current_path = None;
                continue;
            }

            let expects_body = has_body && !(100..200).contains(&status_code) && status_code != 204;
            let content_length = dict_get_ci(&parsed.headers, "content-length").and_then(|v| v.as_str().parse::<u64>().ok());

            let body_out = if expects_body && (content_length.map(|l| l > 0).unwrap_or(true) || parsed.chunked) {
                Some(self.read_response_body(&mut parsed, content_length, &mut sink, timeout_ms)?)
            } else {
                None
            };

            let close_after = parsed.close_after_response || (self.http_version == HttpVersion::Http10 && !parsed.headers.contains_key("connection"));
            if close_after {
                self.disconnect();
            }

            if !(100..300).contains(&status_code) {
                return Err(HttpClientErrorKind::Receive(format!("{} {}", status_code, status_message)).into());
            }

            return Ok(HttpResponse {
                status_code,
                status_message,
                headers: parsed.headers,
                body: body_out,
            });
        }
    }

    fn read_response_body(
        &mut self,
        parsed: &mut crate::socket::http::ParsedHeader,
        content_length: Option<u64>,
        sink: &mut ResponseSink<'_>,
        timeout_ms: i64,
    ) -> Result<Vec<u8>, HttpClientError> {
        let raw = if parsed.chunked {
            let chunk_sink = match sink {
                ResponseSink::Buffer => ChunkSink::Buffer(Vec::new()),
                ResponseSink::Stream(w) => ChunkSink::Stream(&mut **w),
                ResponseSink::Callback(cb) => ChunkSink::Callback(&mut **cb),
            };
            let (body, trailers) = self.socket.read_http_chunked_body(timeout_ms, chunk_sink)?;
            for (k, v) in trailers.iter() {
                parsed.headers.insert(k.clone(), v.clone());
            }
            body.unwrap_or_default()
        } else {
            match sink {
                ResponseSink::Buffer => match content_length {
                    Some(len) => self.socket.recv_binary(len as usize, timeout_ms)?,
                    None => self.read_until_close(timeout_ms)?,
                },
                ResponseSink::Stream(w) => {
                    match content_length {
                        Some(len) => {
                            self.socket.recv_to_stream(&mut **w, len as usize, timeout_ms)?;
                        }
                        None => loop {
                            let chunk = self.socket.brecv(4096, timeout_ms)?;
                            if chunk.is_empty() {
                                break;
                            }
                            w.write_all(&chunk).map_err(crate::socket::SocketError::from)?;
                        },
                    }
                    Vec::new()
                }
                ResponseSink::Callback(cb) => {
                    match content_length {
                        Some(len) => {
                            let mut remaining = len;
                            while remaining > 0 {
                                let chunk = self.socket.brecv((remaining as usize).min(4096), timeout_ms)?;
                                if chunk.is_empty() {
                                    break;
                                }
                                remaining -= chunk.len() as u64;
                                cb(&chunk);
                            }
                        }
                        None => loop {
                            let chunk = self.socket.brecv(4096, timeout_ms)?;
                            if chunk.is_empty() {
                                break;
                            }
                            cb(&chunk);
                        },
                    }
                    Vec::new()
                }
            }
        };

        if matches!(sink, ResponseSink::Callback(_)) {
            return Ok(raw);
        }

        match dict_get_ci(&parsed.headers, "content-encoding").map(|v| v.as_str().to_ascii_lowercase()) {
            // A charset/encoding name put in `Content-Encoding` by mistake
            // (`iso-8859-1`, `utf-8`, ...) names text encoding, not a
            // compression codec; pass the body through unchanged rather
            // than looking it up in the decoder registry.
            Some(enc) if enc.starts_with("iso") || enc.starts_with("utf-") => Ok(raw),
            Some(enc) if !raw.is_empty() => match self.decoders.get(&enc) {
                Some(decoder) => decoder(&raw).map_err(|e| HttpClientErrorKind::Receive(e).into()),
                None => Err(HttpClientErrorKind::Receive(format!("unsupported content-encoding: {}", enc)).into()),
            },
            _ => Ok(raw),
        }
    }

    fn read_until_close(&mut self, timeout_ms: i64) -> Result<Vec<u8>, HttpClientError> {
        let mut out = Vec::new();
        loop {
            let chunk = self.socket.brecv(4096, timeout_ms)?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    // ---- convenience methods --------------------------------------------

    pub fn get(&mut self, path: &str, headers: Dict, info: Option<&mut Dict>) -> Result<Option<Vec<u8>>, HttpClientError> {
        let response = self.send("GET", Some(path), headers, RequestBody::None, info, None, ResponseSink::Buffer)?;
        Ok(response.body.filter(|b| !b.is_empty()))
    }

    pub fn head(&mut self, path: &str, headers: Dict, info: Option<&mut Dict>) -> Result<HttpResponse, HttpClientError> {
        self.send("HEAD", Some(path), headers, RequestBody::None, info, None, ResponseSink::Buffer)
    }

    pub fn post(&mut self, path: &str, headers: Dict, body: &[u8], info: Option<&mut Dict>) -> Result<Option<Vec<u8>>, HttpClientError> {
        let response = self.send("POST", Some(path), headers, RequestBody::Bytes(body), info, None, ResponseSink::Buffer)?;
        Ok(response.body.filter(|b| !b.is_empty()))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_path_falls_back_through_default_path() {
        let client = HttpClient::new();
        assert_eq!(client.message_path(Some("/explicit")), "/explicit");
        assert_eq!(client.message_path(None), "/");
    }

    #[test]
    fn message_path_encodes_spaces_only() {
        let client = HttpClient::new();
        assert_eq!(client.message_path(Some("/a b/c?q=d e")), "/a%20b/c?q=d%20e");
    }

    #[test]
    fn basic_auth_matches_rfc7617_example() {
        assert_eq!(HttpClient::basic_auth("Aladdin", "open sesame"), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let client = HttpClient::new();
        assert!(client.method_has_body("PATCH").is_err());
    }

    #[test]
    fn registered_additional_method_is_accepted() {
        let mut client = HttpClient::new();
        client.register_method("PATCH", true);
        assert_eq!(client.method_has_body("PATCH").unwrap(), true);
    }

    #[test]
    fn set_url_keeps_previous_path_when_new_url_has_none() {
        let mut client = HttpClient::new();
        client.set_url("http://example.com/kept").unwrap();
        client.set_url("http://example.com:9000").unwrap();
        assert_eq!(client.connection.path.as_deref(), Some("/kept"));
    }

    #[test]
    fn apply_redirect_location_resolves_absolute_path() {
        let mut client = HttpClient::new();
        client.set_url("http://example.com/a").unwrap();
        client.apply_redirect_location("/b").unwrap();
        assert_eq!(client.connection.path.as_deref(), Some("/b"));
        assert_eq!(client.connection.host, "example.com");
    }

    #[test]
    fn apply_redirect_location_resolves_relative_path_against_current_directory() {
        let mut client = HttpClient::new();
        client.set_url("http://example.com/dir/a").unwrap();
        client.apply_redirect_location("b").unwrap();
        assert_eq!(client.connection.path.as_deref(), Some("/dir/b"));
    }

    #[test]
    fn apply_redirect_location_follows_absolute_url_to_new_host() {
        let mut client = HttpClient::new();
        client.set_url("http://example.com/a").unwrap();
        client.apply_redirect_location("https://other.example/c").unwrap();
        assert_eq!(client.connection.host, "other.example");
        assert!(client.connection.ssl);
    }

    #[test]
    fn connect_tunnel_wire_format_matches_rfc7231_connect() {
        let mut headers = Dict::new();
        dict_set(&mut headers, "Host", "s:443");
        let head = crate::socket::http::build_message_head("CONNECT s:443 HTTP/1.1", &headers, None, false);
        assert_eq!(String::from_utf8(head).unwrap(), "CONNECT s:443 HTTP/1.1\r\nHost: s:443\r\n\r\n");
    }
}
