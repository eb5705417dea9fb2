//! End-to-end `FtpClient` scenarios against a real two-socket FTP(S)
//! fixture run on a background thread.

use netcore::ftp_client::{FtpClient, GetDestination};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

/// S4: after login, a `RETR` preceded by `TYPE I` and `EPSV` streams the
/// exact bytes the server wrote into the local file.
#[test]
fn ftp_epsv_get_streams_exact_server_bytes() {
    let _ = pretty_env_logger::try_init();
    let control_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let control_port = control_listener.local_addr().unwrap().port();
    let payload = b"exact server bytes for the transfer, unmodified".to_vec();
    let payload_for_server = payload.clone();

    let server = thread::spawn(move || {
        let (mut control, _) = control_listener.accept().unwrap();
        control.write_all(b"220 Welcome\r\n").unwrap();

        let mut reader = BufReader::new(control.try_clone().unwrap());
        let mut line = String::new();

        reader.read_line(&mut line).unwrap(); // USER anonymous
        assert!(line.starts_with("USER anonymous"));
        control.write_all(b"230 Logged in\r\n").unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // TYPE I
        assert_eq!(line.trim_end(), "TYPE I");
        control.write_all(b"200 Type set to I\r\n").unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // EPSV
        assert_eq!(line.trim_end(), "EPSV");
        let data_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let data_port = data_listener.local_addr().unwrap().port();
        control
            .write_all(format!("229 Entering Extended Passive Mode (|||{}|)\r\n", data_port).as_bytes())
            .unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // RETR file.bin
        assert_eq!(line.trim_end(), "RETR file.bin");
        control.write_all(b"150 Opening data connection\r\n").unwrap();

        let (mut data, _) = data_listener.accept().unwrap();
        data.write_all(&payload_for_server).unwrap();
        drop(data);

        control.write_all(b"226 Transfer complete\r\n").unwrap();
    });

    let mut client = FtpClient::new();
    client.set_url(&format!("ftp://127.0.0.1:{}/", control_port)).unwrap();
    client.login().unwrap();
    assert!(client.is_logged_in());

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    let written = client.get("file.bin", GetDestination::Path(&path)).unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(fs::read(&path).unwrap(), payload);
    server.join().unwrap();
}

/// The EPSV-then-PASV-then-PORT fallback (invariant 8): a server that
/// refuses `EPSV` but accepts `PASV` gets exactly one of each, and the
/// mode pins to `Pasv` for the rest of the session.
#[test]
fn ftp_falls_back_from_epsv_to_pasv_when_epsv_is_refused() {
    let _ = pretty_env_logger::try_init();
    let control_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let control_port = control_listener.local_addr().unwrap().port();
    let payload = b"pasv fallback payload".to_vec();
    let payload_for_server = payload.clone();

    let server = thread::spawn(move || {
        let (mut control, _) = control_listener.accept().unwrap();
        control.write_all(b"220 Welcome\r\n").unwrap();

        let mut reader = BufReader::new(control.try_clone().unwrap());
        let mut line = String::new();

        reader.read_line(&mut line).unwrap(); // USER anonymous
        control.write_all(b"230 Logged in\r\n").unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // TYPE I
        control.write_all(b"200 Type set to I\r\n").unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // EPSV
        assert_eq!(line.trim_end(), "EPSV");
        control.write_all(b"500 EPSV not understood\r\n").unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // PASV
        assert_eq!(line.trim_end(), "PASV");
        let data_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let data_port = data_listener.local_addr().unwrap().port();
        let p1 = (data_port >> 8) as u8;
        let p2 = (data_port & 0xff) as u8;
        control
            .write_all(format!("227 Entering Passive Mode (127,0,0,1,{},{})\r\n", p1, p2).as_bytes())
            .unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap(); // RETR small.bin
        control.write_all(b"150 Opening data connection\r\n").unwrap();

        let (mut data, _) = data_listener.accept().unwrap();
        data.write_all(&payload_for_server).unwrap();
        drop(data);

        control.write_all(b"226 Transfer complete\r\n").unwrap();
    });

    let mut client = FtpClient::new();
    client.set_url(&format!("ftp://127.0.0.1:{}/", control_port)).unwrap();
    client.login().unwrap();

    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    let written = client.get("small.bin", GetDestination::Path(&path)).unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(fs::read(&path).unwrap(), payload);
    assert_eq!(client.mode(), netcore::ftp_client::Mode::Pasv);
    server.join().unwrap();
}
