//! Blocking TCP/UNIX/TLS socket core with an HTTP/1.1 client and an
//! FTP(S) client built on top of it.
//!
//! [`socket::Socket`] is the single primitive: a thread-safe, reentrant
//! connection wrapping a plain TCP stream, a UNIX-domain stream, or
//! either upgraded to TLS. [`http_client::HttpClient`] and
//! [`ftp_client::FtpClient`] each drive one (HTTP) or two (FTP,
//! control+data) `Socket`s through their respective wire protocols.

pub mod ftp_client;
pub mod http_client;
pub mod socket;
pub mod url;
pub mod value;

pub use ftp_client::FtpClient;
pub use http_client::HttpClient;
pub use socket::Socket;
