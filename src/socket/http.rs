//! HTTP/1.1 wire framing primitives owned by the socket layer
//! (`spec.md` §4.1, "HTTP message framing" / "Chunked write with
//! callback"): header-block reading and parsing, chunked body reading,
//! and chunked writing driven by a caller-supplied callback.
//!
//! These are pure functions over a small [`Framed`] capability rather
//! than methods on `Socket` directly, so the state machines here can be
//! unit-tested against an in-memory fake instead of a live TCP pair.

use crate::socket::error::{SocketError, SocketErrorKind};
use crate::socket::events::EventKind;
use crate::value::{dict_insert_folding, Dict};
use std::io::Write;

/// The hard cap on a header block's size (`spec.md`: `QORE_MAX_HEADER_SIZE`).
pub const MAX_HEADER_SIZE: usize = 16_384;

/// What [`Socket`](crate::socket::Socket) exposes to the framing helpers
/// in this module: pull a chunk of bytes (buffer-first, else one
/// underlying read), push unconsumed bytes back for the next pull, push
/// bytes out, and emit framing events.
pub trait Framed {
    /// Return the next available chunk of bytes: whatever's already
    /// buffered, or one `recv`/TLS-read. An empty result means the peer
    /// closed the connection.
    fn recv_chunk(&mut self, timeout_ms: i64) -> Result<Vec<u8>, SocketError>;

    /// Prepend bytes this caller read but didn't consume, so the next
    /// `recv_chunk` sees them first.
    fn push_back(&mut self, data: Vec<u8>);

    /// Write `data` in full, honouring the timeout.
    fn send_all(&mut self, data: &[u8], timeout_ms: i64) -> Result<(), SocketError>;

    fn emit(&self, kind: EventKind, fields: &[(&str, String)]);

    /// Non-blocking peek for unsolicited bytes already on the wire, used
    /// by the chunked-write abort probe. `Socket` overrides this with a
    /// real zero-timeout read; a bare test fake has no wire to peek at.
    fn has_unexpected_data(&mut self) -> Result<bool, SocketError> {
        Ok(false)
    }
}

/// Accumulate bytes until a blank-line header terminator is seen,
/// tracking which of `\r`, `\r\n`, `\r\n\r`, `\n` the tail currently
/// matches, the way `spec.md` describes `readHTTPHeaderString`'s state
/// machine. Unconsumed bytes after the terminator are pushed back onto
/// `framed` for the body reader that follows.
pub fn read_http_header_string(framed: &mut impl Framed, timeout_ms: i64) -> Result<String, SocketError> {
    let mut acc: Vec<u8> = Vec::new();

    loop {
        if let Some((header_end, consumed_end)) = find_header_terminator(&acc) {
            let header_str = String::from_utf8_lossy(&acc[..header_end]).into_owned();
            if consumed_end < acc.len() {
                framed.push_back(acc[consumed_end..].to_vec());
            }
            return Ok(header_str);
        }

        if acc.len() > MAX_HEADER_SIZE {
            return Err(SocketErrorKind::HttpError(format!(
                "header block exceeded {} bytes",
                MAX_HEADER_SIZE
            ))
            .into());
        }

        let chunk = framed.recv_chunk(timeout_ms)?;
        if chunk.is_empty() {
            return Err(SocketErrorKind::Closed(String::from_utf8_lossy(&acc).into_owned()).into());
        }
        acc.extend_from_slice(&chunk);
    }
}

/// Find the blank-line header terminator (`\r\n\r\n`, `\n\n`, or the mixed
/// `\r\n\n` / `\n\r\n` forms), if fully seen yet. Returns
/// `(header_end, consumed_end)`: `header_end` is the byte offset just past
/// the last header line's own line terminator (what `readHTTPHeaderString`
/// hands back), `consumed_end` is the offset past the blank line itself
/// (where the body, if any, begins).
fn find_header_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' {
            // bare "\n\n"
            if buf.get(i + 1) == Some(&b'\n') {
                return Some((i + 1, i + 2));
            }
            // a header line ending bare "\n" followed by the blank
            // line's own "\r\n"
            if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
                return Some((i + 1, i + 3));
            }
        }
        if buf[i] == b'\r' && buf.get(i + 1) == Some(&b'\n') {
            // "\r\n" followed by another "\r\n" or a bare "\n"
            if buf.get(i + 2) == Some(&b'\r') && buf.get(i + 3) == Some(&b'\n') {
                return Some((i + 2, i + 4));
            }
            if buf.get(i + 2) == Some(&b'\n') {
                return Some((i + 2, i + 3));
            }
        }
        i += 1;
    }
    None
}

/// The parsed first line of an HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstLine {
    Status { code: u32, message: String, version: String },
    Request { method: String, path: String, version: String },
}

/// The result of parsing a header block, per `spec.md`'s `readHTTPHeader`.
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub first_line: FirstLine,
    pub headers: Dict,
    /// Derived from `Connection`/`Proxy-Connection` plus the HTTP/1.0
    /// keep-alive default.
    pub close_after_response: bool,
    /// `Transfer-Encoding: chunked` was present.
    pub chunked: bool,
    /// `charset=` extracted from `Content-Type`, if any.
    pub charset: Option<String>,
    /// `Content-Type` started with `multipart/`.
    pub multipart: bool,
    /// Request-only: `Accept-Encoding` tokens, split on commas.
    pub accept_encoding: Vec<String>,
    /// Request-only: preferred charset distilled from `Accept-Charset`.
    pub accept_charset: Option<String>,
}

/// Parse a raw header block (as returned by [`read_http_header_string`])
/// into a [`ParsedHeader`]. `is_response` selects the first-line grammar.
pub fn parse_http_header(raw: &str, is_response: bool) -> Result<ParsedHeader, SocketError> {
    let mut lines = raw.split(|c| c == '\n').map(|l| l.trim_end_matches('\r'));

    let first = lines.next().unwrap_or("").trim();
    let first_line = if is_response {
        parse_status_line(first)?
    } else {
        parse_request_line(first)?
    };

    let mut headers = Dict::new();
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let idx = line.find(':').ok_or_else(|| SocketErrorKind::HttpError(format!("malformed header line: {}", line)))?;
        let key = line[..idx].trim().to_ascii_lowercase();
        let value = line[idx + 1..].trim().to_string();
        dict_insert_folding(&mut headers, key, value);
    }

    let version = match &first_line {
        FirstLine::Status { version, .. } | FirstLine::Request { version, .. } => version.clone(),
    };

    let connection_token = headers
        .get("connection")
        .or_else(|| headers.get("proxy-connection"))
        .map(|v| v.as_str().to_ascii_lowercase());
    let close_after_response = match connection_token {
        Some(ref tok) if tok.contains("close") => true,
        Some(ref tok) if tok.contains("keep-alive") => false,
        _ => version != "1.1",
    };

    let chunked = headers
        .get("transfer-encoding")
        .map(|v| v.as_str().to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    let (charset, multipart) = match headers.get("content-type") {
        Some(v) => {
            let ct = v.as_str();
            let charset = ct
                .split(';')
                .skip(1)
                .find_map(|param| {
                    let param = param.trim();
                    param.strip_prefix("charset=").map(|c| c.trim_matches('"').to_string())
                });
            let multipart = ct.trim_start().to_ascii_lowercase().starts_with("multipart/");
            (charset, multipart)
        }
        None => (None, false),
    };

    let accept_encoding = headers
        .get("accept-encoding")
        .map(|v| v.as_str().split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let accept_charset = headers.get("accept-charset").map(|v| {
        let raw = v.as_str();
        if raw.contains('*') || raw.to_ascii_lowercase().contains("utf-8") {
            "utf8".to_string()
        } else {
            raw.split(',').next().unwrap_or("utf8").trim().to_string()
        }
    });

    Ok(ParsedHeader {
        first_line,
        headers,
        close_after_response,
        chunked,
        charset,
        multipart,
        accept_encoding,
        accept_charset,
    })
}

fn parse_status_line(line: &str) -> Result<FirstLine, SocketError> {
    let mut parts = line.splitn(3, ' ');
    let version_tok = parts.next().unwrap_or("");
    let code_tok = parts.next().unwrap_or("");
    let message = parts.next().unwrap_or("").to_string();

    let version = version_tok
        .strip_prefix("HTTP/")
        .ok_or_else(|| SocketError::from(SocketErrorKind::HttpError(format!("bad status line: {}", line))))?
        .to_string();
    let code = code_tok
        .parse::<u32>()
        .map_err(|_| SocketError::from(SocketErrorKind::HttpError(format!("bad status code: {}", code_tok))))?;

    Ok(FirstLine::Status { code, message, version })
}

fn parse_request_line(line: &str) -> Result<FirstLine, SocketError> {
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    let version_tok = parts.next().unwrap_or("");
    if method.is_empty() || path.is_empty() {
        return Err(SocketErrorKind::HttpError(format!("bad request line: {}", line)).into());
    }
    let version = version_tok.strip_prefix("HTTP/").unwrap_or("1.1").to_string();
    Ok(FirstLine::Request { method, path, version })
}

/// Build the wire bytes for a request/response's start line + headers,
/// the framing half of `spec.md`'s `sendHttpMessage`. `content_length`
/// and `chunked` decide which of `Content-Length`/`Transfer-Encoding` is
/// inserted, per the precedence `spec.md` documents (an explicit
/// `transfer-encoding` suppresses auto `Content-Length`; a send callback
/// with neither set gets `chunked` inserted).
pub fn build_message_head(request_line: &str, headers: &Dict, content_length: Option<u64>, chunked: bool) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(request_line.as_bytes());
    out.extend_from_slice(b"\r\n");

    let has_transfer_encoding = headers.contains_key("transfer-encoding");
    for (key, value) in headers.iter() {
        for v in value.as_list() {
            out.extend_from_slice(format!("{}: {}\r\n", key, v).as_bytes());
        }
    }
    if chunked && !has_transfer_encoding {
        out.extend_from_slice(b"Transfer-Encoding: chunked\r\n");
    } else if !has_transfer_encoding {
        if let Some(len) = content_length {
            out.extend_from_slice(format!("Content-Length: {}\r\n", len).as_bytes());
        }
    }
    out.extend_from_slice(b"\r\n");
    out
}

/// Sink for chunked-body bytes: either a callback invoked per chunk, or
/// an accumulating buffer that becomes the `body` key on completion.
pub enum ChunkSink<'a> {
    Callback(&'a mut dyn FnMut(&[u8])),
    Stream(&'a mut dyn Write),
    Buffer(Vec<u8>),
}

/// Read a `Transfer-Encoding: chunked` body to completion, per
/// `spec.md`'s `readHTTPChunkedBody`. Returns the accumulated body (when
/// `sink` is [`ChunkSink::Buffer`]) and the trailer dict, merged the same
/// way header lines fold.
pub fn read_http_chunked_body(
    framed: &mut impl Framed,
    timeout_ms: i64,
    mut sink: ChunkSink,
) -> Result<(Option<Vec<u8>>, Dict), SocketError> {
    let mut acc: Vec<u8> = Vec::new();
    let mut total_received: u64 = 0;

    loop {
        let size_line = read_line(framed, &mut acc, timeout_ms)?;
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_token, 16)
            .map_err(|_| SocketError::from(SocketErrorKind::ReadHttpChunkError(format!("bad chunk size: {}", size_token))))?;

        framed.emit(EventKind::HttpChunkSize, &[("size", size.to_string())]);

        if size == 0 {
            break;
        }

        let mut remaining = size;
        while remaining > 0 {
            if acc.is_empty() {
                let chunk = framed.recv_chunk(timeout_ms)?;
                if chunk.is_empty() {
                    return Err(SocketErrorKind::Closed(String::new()).into());
                }
                acc = chunk;
            }
            let take = remaining.min(acc.len());
            let (payload, rest) = acc.split_at(take);
            match &mut sink {
                ChunkSink::Callback(cb) => cb(payload),
                ChunkSink::Stream(w) => w.write_all(payload).map_err(SocketError::from)?,
                ChunkSink::Buffer(buf) => buf.extend_from_slice(payload),
            }
            total_received += take as u64;
            acc = rest.to_vec();
            remaining -= take;
        }
        framed.emit(
            EventKind::HttpChunkedDataReceived,
            &[("read", size.to_string()), ("total_read", total_received.to_string())],
        );

        // mandatory trailing CRLF after the chunk payload
        consume_crlf(framed, &mut acc, timeout_ms)?;
    }

    // trailer block: same blank-line-terminated grammar as headers, but
    // already-buffered bytes (`acc`) must be seen first.
    if !acc.is_empty() {
        framed.push_back(acc);
    }
    let trailer_raw = read_http_header_string(framed, timeout_ms)?;
    let mut trailers = Dict::new();
    for line in trailer_raw.split('\n') {
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        if let Some(idx) = line.find(':') {
            dict_insert_folding(&mut trailers, line[..idx].trim().to_ascii_lowercase(), line[idx + 1..].trim().to_string());
        }
    }
    framed.emit(EventKind::HttpFootersReceived, &[]);

    let body = match sink {
        ChunkSink::Buffer(buf) => Some(buf),
        _ => None,
    };
    Ok((body, trailers))
}

/// Read one `\r\n`- or `\n`-terminated line, pulling from `carry` (bytes
/// already read but not yet consumed) before the socket.
fn read_line(framed: &mut impl Framed, carry: &mut Vec<u8>, timeout_ms: i64) -> Result<String, SocketError> {
    loop {
        if let Some(pos) = carry.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = carry.drain(..=pos).collect();
            line.pop(); // '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        let chunk = framed.recv_chunk(timeout_ms)?;
        if chunk.is_empty() {
            return Err(SocketErrorKind::Closed(String::from_utf8_lossy(carry).into_owned()).into());
        }
        carry.extend_from_slice(&chunk);
    }
}

fn consume_crlf(framed: &mut impl Framed, carry: &mut Vec<u8>, timeout_ms: i64) -> Result<(), SocketError> {
    while carry.len() < 2 {
        let chunk = framed.recv_chunk(timeout_ms)?;
        if chunk.is_empty() {
            return Err(SocketErrorKind::Closed(String::new()).into());
        }
        carry.extend_from_slice(&chunk);
    }
    carry.drain(..2);
    Ok(())
}

/// What a chunked-write callback returned, per the table in `spec.md`
/// ("cb result" / "emitted on wire").
pub enum ChunkWriteResult {
    Data(Vec<u8>),
    Trailers(Dict),
    Done,
}

/// Drive `spec.md`'s `sendHttpChunkedWithCallback`: repeatedly invoke
/// `cb`, writing each non-empty result as one chunk, until it signals
/// end-of-body either by an empty payload or [`ChunkWriteResult::Done`].
/// If `probe_for_unexpected_data` is set, [`Framed::has_unexpected_data`]
/// is checked before every iteration for unsolicited response bytes
/// already sitting on the wire; a `true` result stops the writer early
/// (so the HTTP client can read that early response) without it being
/// treated as an error.
pub fn send_http_chunked_with_callback(
    framed: &mut impl Framed,
    timeout_ms: i64,
    mut cb: impl FnMut() -> Result<ChunkWriteResult, SocketError>,
    probe_for_unexpected_data: bool,
) -> Result<(), SocketError> {
    loop {
        if probe_for_unexpected_data && framed.has_unexpected_data()? {
            return Ok(());
        }

        match cb()? {
            ChunkWriteResult::Data(bytes) if !bytes.is_empty() => {
                let mut frame = format!("{:x}\r\n", bytes.len()).into_bytes();
                frame.extend_from_slice(&bytes);
                frame.extend_from_slice(b"\r\n");
                framed.send_all(&frame, timeout_ms)?;
            }
            ChunkWriteResult::Data(_) => {
                framed.send_all(b"0\r\n\r\n", timeout_ms)?;
                return Ok(());
            }
            ChunkWriteResult::Trailers(trailers) => {
                let mut frame = b"0\r\n".to_vec();
                for (key, value) in trailers.iter() {
                    frame.extend_from_slice(format!("{}: {}\r\n", key, value.as_str()).as_bytes());
                }
                frame.extend_from_slice(b"\r\n");
                framed.send_all(&frame, timeout_ms)?;
                return Ok(());
            }
            ChunkWriteResult::Done => {
                framed.send_all(b"0\r\n\r\n", timeout_ms)?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeFramed {
        inbound: VecDeque<Vec<u8>>,
        outbound: Vec<u8>,
    }

    impl FakeFramed {
        fn new(chunks: Vec<&[u8]>) -> Self {
            FakeFramed {
                inbound: chunks.into_iter().map(|c| c.to_vec()).collect(),
                outbound: Vec::new(),
            }
        }
    }

    impl Framed for FakeFramed {
        fn recv_chunk(&mut self, _timeout_ms: i64) -> Result<Vec<u8>, SocketError> {
            Ok(self.inbound.pop_front().unwrap_or_default())
        }
        fn push_back(&mut self, data: Vec<u8>) {
            if !data.is_empty() {
                self.inbound.push_front(data);
            }
        }
        fn send_all(&mut self, data: &[u8], _timeout_ms: i64) -> Result<(), SocketError> {
            self.outbound.extend_from_slice(data);
            Ok(())
        }
        fn emit(&self, _kind: EventKind, _fields: &[(&str, String)]) {}
    }

    #[test]
    fn reads_header_block_and_leaves_body_buffered() {
        let mut framed = FakeFramed::new(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"]);
        let raw = read_http_header_string(&mut framed, -1).unwrap();
        assert_eq!(raw, "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n");
        let leftover = framed.recv_chunk(-1).unwrap();
        assert_eq!(leftover, b"hello");
    }

    #[test]
    fn parses_status_line_and_folds_repeated_headers() {
        let raw = "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n";
        let parsed = parse_http_header(raw, true).unwrap();
        match parsed.first_line {
            FirstLine::Status { code, .. } => assert_eq!(code, 200),
            _ => panic!("expected status line"),
        }
        assert_eq!(parsed.headers.get("set-cookie").unwrap().as_list(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn extracts_charset_and_multipart_from_content_type() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n";
        let parsed = parse_http_header(raw, true).unwrap();
        assert_eq!(parsed.charset.as_deref(), Some("utf-8"));
        assert!(!parsed.multipart);
    }

    #[test]
    fn reads_chunked_body_into_buffer_and_merges_trailers() {
        let mut framed = FakeFramed::new(vec![b"5\r\nhello\r\n0\r\nX-Trailer: yes\r\n\r\n"]);
        let (body, trailers) = read_http_chunked_body(&mut framed, -1, ChunkSink::Buffer(Vec::new())).unwrap();
        assert_eq!(body.unwrap(), b"hello");
        assert_eq!(trailers.get("x-trailer").unwrap().as_str(), "yes");
    }

    #[test]
    fn chunked_write_stops_on_empty_payload() {
        let mut framed = FakeFramed::new(vec![]);
        let mut calls = 0;
        send_http_chunked_with_callback(
            &mut framed,
            -1,
            || {
                calls += 1;
                if calls == 1 {
                    Ok(ChunkWriteResult::Data(b"hi".to_vec()))
                } else {
                    Ok(ChunkWriteResult::Data(Vec::new()))
                }
            },
            false,
        )
        .unwrap();
        assert_eq!(framed.outbound, b"2\r\nhi\r\n0\r\n\r\n");
    }
}
