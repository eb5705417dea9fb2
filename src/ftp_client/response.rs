//! The FTP control-channel reply grammar (`spec.md` §4.3 "Response
//! reader", §6 "FTP wire"): replies terminated by a line whose first four
//! bytes match `DDD SP`, with RFC 959 multi-line continuation (`DDD-...`
//! lines before the terminal `DDD SP...` line); plus the small amount of
//! reply-body parsing the data-channel negotiation and `pwd` need (PASV's
//! `(h1,h2,h3,h4,p1,p2)`, EPSV's `|||port|`, PWD's `"path"` with `""`
//! escaping for an embedded quote).

use crate::ftp_client::error::{FtpClientError, FtpClientErrorKind};
use crate::socket::http::Framed;
use crate::socket::{Socket, SocketErrorKind};
use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;

/// One parsed control-channel reply: the three-digit code plus the
/// message text with the code prefix and continuation dashes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpResponse {
    pub code: u32,
    pub message: String,
}

impl FtpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

/// Read one (possibly multi-line) reply from the control socket, per
/// `spec.md`: "Reads from the control socket into a line accumulator
/// until a line begins with three ASCII digits followed by a space...
/// Any over-read beyond the terminator is copied into
/// `controlResidualBuffer` for the next read" — modeled here by pushing
/// unconsumed bytes straight back onto `control`'s own read buffer via
/// [`Framed::push_back`], rather than keeping a second buffer in
/// `FtpClient`.
pub fn read_response(control: &mut Socket, timeout_ms: i64) -> Result<FtpResponse, FtpClientError> {
    let mut carry: Vec<u8> = Vec::new();
    let mut code: Option<u32> = None;
    let mut lines: Vec<String> = Vec::new();

    loop {
        let line = read_line(control, &mut carry, timeout_ms)?;
        let is_terminal_form = line.as_bytes().get(3) == Some(&b' ');
        match parse_terminator(&line) {
            Some((c, rest)) => match code {
                None => {
                    code = Some(c);
                    lines.push(rest);
                    // A line with '-' right after the code starts a
                    // multi-line reply; a space means it was the whole thing.
                    if is_terminal_form {
                        break;
                    }
                }
                Some(expected) if is_terminal_form && c == expected => {
                    lines.push(rest);
                    break;
                }
                // A continuation line that happens to start with a
                // 3-digit code of its own (e.g. echoing another reply
                // code in free text): still strip it like any other
                // code-prefixed line for consistent message text.
                _ => lines.push(rest),
            },
            None => lines.push(line),
        }
    }

    if !carry.is_empty() {
        control.push_back(carry);
    }

    control.emit(
        crate::socket::EventKind::FtpMessageReceived,
        &[("code", code.unwrap_or(0).to_string())],
    );

    Ok(FtpResponse {
        code: code.ok_or_else(|| FtpClientErrorKind::Response("empty control-channel reply".to_string()))?,
        message: lines.join("\n"),
    })
}

/// `DDD` followed by `-` or ` `: returns the code and the text after the
/// separator, or `None` if the line doesn't start with a 3-digit code.
fn parse_terminator(line: &str) -> Option<(u32, String)> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes[3] != b' ' && bytes[3] != b'-' {
        return None;
    }
    let code = line[..3].parse().ok()?;
    Some((code, line[4..].to_string()))
}

fn read_line(control: &mut Socket, carry: &mut Vec<u8>, timeout_ms: i64) -> Result<String, FtpClientError> {
    loop {
        if let Some(pos) = carry.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = carry.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        let chunk = control.recv_chunk(timeout_ms)?;
        if chunk.is_empty() {
            return Err(SocketErrorKind::Closed(String::from_utf8_lossy(carry).into_owned()).into());
        }
        carry.extend_from_slice(&chunk);
    }
}

lazy_static! {
    static ref PASV_NUMBERS: Regex = Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})").unwrap();
    static ref EPSV_PORT: Regex = Regex::new(r"\|\|\|(\d{1,5})\|").unwrap();
}

/// Parse a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply into an
/// address and port, per `spec.md`'s `PASV` grammar.
pub fn parse_pasv_reply(message: &str) -> Result<(Ipv4Addr, u16), FtpClientError> {
    let caps = PASV_NUMBERS
        .captures(message)
        .ok_or_else(|| FtpClientErrorKind::Response(format!("malformed PASV reply: {}", message)))?;
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = caps[i + 1]
            .parse()
            .map_err(|_| FtpClientErrorKind::Response(format!("malformed PASV reply: {}", message)))?;
    }
    let p1: u16 = caps[5].parse().map_err(|_| FtpClientErrorKind::Response(format!("malformed PASV reply: {}", message)))?;
    let p2: u16 = caps[6].parse().map_err(|_| FtpClientErrorKind::Response(format!("malformed PASV reply: {}", message)))?;
    Ok((Ipv4Addr::from(octets), p1 * 256 + p2))
}

/// Parse a `229 Entering Extended Passive Mode (|||port|)` reply, per
/// `spec.md`'s `EPSV` grammar.
pub fn parse_epsv_reply(message: &str) -> Result<u16, FtpClientError> {
    let caps = EPSV_PORT
        .captures(message)
        .ok_or_else(|| FtpClientErrorKind::Response(format!("malformed EPSV reply: {}", message)))?;
    caps[1]
        .parse()
        .map_err(|_| FtpClientErrorKind::Response(format!("malformed EPSV reply: {}", message)).into())
}

/// Parse a `PWD` reply body (`"/some/path"`, with an embedded quote
/// doubled as `""`) into the bare path, per `spec.md`'s `pwd`:
/// `"parses quoted path with `""` -> `"` unescaping"`.
pub fn parse_pwd_reply(message: &str) -> Result<String, FtpClientError> {
    let start = message
        .find('"')
        .ok_or_else(|| FtpClientErrorKind::Pwd(format!("no quoted path in reply: {}", message)))?;
    let rest = &message[start + 1..];

    let mut out = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                out.push('"');
                chars.next();
                continue;
            }
            return Ok(out);
        }
        out.push(c);
    }
    Err(FtpClientErrorKind::Pwd(format!("unterminated quoted path in reply: {}", message)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_terminator_accepts_dash_or_space() {
        assert_eq!(parse_terminator("200 OK"), Some((200, "OK".to_string())));
        assert_eq!(parse_terminator("200-partial"), Some((200, "partial".to_string())));
        assert_eq!(parse_terminator("not a reply"), None);
    }

    #[test]
    fn parses_pasv_reply_address_and_port() {
        let (addr, port) = parse_pasv_reply("227 Entering Passive Mode (127,0,0,1,195,80)").unwrap();
        assert_eq!(addr, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(port, 195 * 256 + 80);
    }

    #[test]
    fn parses_epsv_reply_port() {
        let port = parse_epsv_reply("229 Entering Extended Passive Mode (|||50000|)").unwrap();
        assert_eq!(port, 50000);
    }

    #[test]
    fn parses_pwd_reply_unescaping_doubled_quotes() {
        let path = parse_pwd_reply("257 \"/a/\"\"b\"\"/c\" is the current directory").unwrap();
        assert_eq!(path, "/a/\"b\"/c");
    }
}
