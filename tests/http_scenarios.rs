//! End-to-end `HttpClient`/`Socket` scenarios against real loopback
//! listeners on background threads (no mocks).

use netcore::socket::{Socket, SocketErrorKind};
use netcore::value::Dict;
use netcore::HttpClient;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

/// S1: a chunked response decodes to the exact concatenated bytes, and
/// the socket is still usable afterwards.
#[test]
fn http_get_chunked_response_decodes_to_exact_bytes() {
    let _ = pretty_env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n\
                  5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
            )
            .unwrap();
    });

    let mut client = HttpClient::new();
    client.set_url(&format!("http://127.0.0.1:{}/", addr.port())).unwrap();
    let mut info = Dict::new();
    let body = client.get("/", Dict::new(), Some(&mut info)).unwrap();

    assert_eq!(body.unwrap(), b"hello world".to_vec());
    assert_eq!(info.get("transfer-encoding").map(|v| v.as_str()), Some("chunked".to_string()));
    server.join().unwrap();
}

/// S2: the exact request bytes for a POST with a body, including the
/// `Content-Length` the client computes itself.
#[test]
fn http_post_sends_exact_wire_bytes() {
    let _ = pretty_env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).unwrap();
        buf.truncate(n);
        stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").unwrap();
        buf
    });

    let mut client = HttpClient::new();
    client.set_url(&format!("http://127.0.0.1:{}/", port)).unwrap();
    client.post("/x", Dict::new(), br#"{"a":1}"#, None).unwrap();

    let request = String::from_utf8(server.join().unwrap()).unwrap();
    let expected = format!(
        "POST /x HTTP/1.1\r\nAccept: text/html\r\nContent-Type: text/html\r\nConnection: Keep-Alive\r\n\
         User-Agent: netcore-http-client/0.1\r\nAccept-Encoding: deflate,gzip,bzip2\r\n\
         Host: 127.0.0.1:{}\r\nContent-Length: 7\r\n\r\n{{\"a\":1}}",
        port
    );
    pretty_assertions::assert_eq!(request, expected);
}

/// S5: a chain of two redirects is followed and recorded in `info`.
#[test]
fn http_redirect_chain_is_followed_and_recorded() {
    let _ = pretty_env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port();
    let server = thread::spawn(move || {
        for (request_path, reply) in [
            ("/a", "HTTP/1.1 302 Found\r\nLocation: /b\r\nContent-Length: 0\r\n\r\n"),
            ("/b", "HTTP/1.1 302 Found\r\nLocation: /c\r\nContent-Length: 0\r\n\r\n"),
            ("/c", "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"),
        ] {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            let request = String::from_utf8_lossy(&buf[..n]);
            assert!(request.starts_with(&format!("GET {} HTTP/1.1", request_path)), "unexpected request: {}", request);
            stream.write_all(reply.as_bytes()).unwrap();
        }
    });

    let mut client = HttpClient::new();
    client.set_max_redirects(5);
    client.set_url(&format!("http://127.0.0.1:{}/a", port)).unwrap();
    let mut info = Dict::new();
    let body = client.get("/a", Dict::new(), Some(&mut info)).unwrap();

    assert_eq!(body.unwrap(), b"ok".to_vec());
    assert_eq!(info.get("redirect-1").map(|v| v.as_str()), Some("/b".to_string()));
    assert_eq!(info.get("redirect-2").map(|v| v.as_str()), Some("/c".to_string()));
    server.join().unwrap();
}

/// S5 (bound): a server that always redirects to itself fails with
/// `MaximumRedirectsExceeded` after `max_redirects + 1` requests.
#[test]
fn http_redirect_loop_is_bounded_by_max_redirects() {
    let _ = pretty_env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port();
    let max_redirects = 3u32;
    let server = thread::spawn(move || {
        for _ in 0..(max_redirects + 1) {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).unwrap();
            stream.write_all(b"HTTP/1.1 302 Found\r\nLocation: /a\r\nContent-Length: 0\r\n\r\n").unwrap();
        }
    });

    let mut client = HttpClient::new();
    client.set_max_redirects(max_redirects);
    client.set_url(&format!("http://127.0.0.1:{}/a", port)).unwrap();
    let err = client.get("/a", Dict::new(), None).unwrap_err();
    assert_eq!(err.kind(), &netcore::http_client::HttpClientErrorKind::MaximumRedirectsExceeded(max_redirects));
    server.join().unwrap();
}

/// S3: a real loopback proxy receives exactly one `CONNECT` with the
/// RFC 7231 wire format this scenario specifies, over a real socket; a
/// non-2xx reply surfaces as `ProxyProtocol`. (The full positive path
/// additionally performs a TLS handshake over the tunnel before issuing
/// the origin request, which this loopback fixture has no certificate
/// to exercise — see `SPEC_FULL.md` §8. Invariant 9, that a second
/// request reuses rather than repeats the `CONNECT`, is covered at the
/// unit level by `proxy_tunnel_established` gating `needs_connect_tunnel`.)
#[test]
fn connect_tunnel_wire_format_over_a_real_socket_and_proxy_refusal() {
    let _ = pretty_env_logger::try_init();
    let proxy_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let proxy_port = proxy_listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (mut stream, _) = proxy_listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).unwrap();
        let request = String::from_utf8_lossy(&buf[..n]).into_owned();
        stream.write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\nContent-Length: 0\r\n\r\n").unwrap();
        request
    });

    let mut client = HttpClient::new();
    client.set_proxy(&format!("http://127.0.0.1:{}", proxy_port)).unwrap();
    client.set_url("https://s.example.com:443/a").unwrap();
    let err = client.get("/a", Dict::new(), None).unwrap_err();
    assert_eq!(
        err.kind(),
        &netcore::http_client::HttpClientErrorKind::ProxyProtocol("proxy refused CONNECT: 407".to_string())
    );

    let request = server.join().unwrap();
    assert_eq!(request, "CONNECT s.example.com:443 HTTP/1.1\r\nHost: s.example.com:443\r\n\r\n");
}

/// S6: a `recv` timeout leaves the socket open, and a subsequent `recv`
/// with enough time succeeds once the peer writes.
#[test]
fn socket_recv_timeout_preserves_the_socket() {
    let _ = pretty_env_logger::try_init();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(700));
        stream.write_all(b"hi").unwrap();
        thread::sleep(Duration::from_millis(200));
    });

    let mut socket = Socket::new();
    socket.connect_inet("127.0.0.1", addr.port(), 1000).unwrap();

    let started = Instant::now();
    let err = socket.recv(2, 300).unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(err.kind(), &SocketErrorKind::Timeout);
    assert!(socket.is_open());

    let got = socket.recv(2, 5000).unwrap();
    assert_eq!(got, "hi");
    server.join().unwrap();
}
