//! Fetching the raw dump from one gmond endpoint.
//!
//! gmond writes its whole XML state on accept and closes the socket, so a
//! fetch is connect → read to EOF → shutdown. The [`Transport`] trait lets
//! the collector run against anything that can produce that payload.

use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Error, Result};

/// One gmond daemon to poll, with its position among configured endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Index among configured endpoints. Provenance only, never an identity key.
    pub group: usize,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, group: usize) -> Self {
        Self {
            host: host.into(),
            port,
            group,
        }
    }

    /// `host:port` for logs and reports.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Source of raw gmond payloads.
pub trait Transport: Send + Sync {
    /// Fetch everything the endpoint sends before closing the connection.
    fn fetch(&self, endpoint: &Endpoint) -> Result<String>;
}

/// Plain TCP transport.
///
/// Without timeouts a daemon that never closes the connection blocks its
/// fetch indefinitely, matching gmond's own clients.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound how long establishing each connection may take.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Bound how long each read may block waiting for data.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    fn connect(&self, endpoint: &Endpoint) -> Result<TcpStream> {
        let Some(timeout) = self.connect_timeout else {
            return Ok(TcpStream::connect((endpoint.host.as_str(), endpoint.port))?);
        };

        let addrs: Vec<SocketAddr> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .collect();
        let mut last_err = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => Error::Io(e),
            None => Error::Resolve {
                host: endpoint.host.clone(),
                port: endpoint.port,
            },
        })
    }
}

impl Transport for TcpTransport {
    fn fetch(&self, endpoint: &Endpoint) -> Result<String> {
        let mut stream = self.connect(endpoint)?;
        stream.set_read_timeout(self.read_timeout)?;

        let mut buf = Vec::with_capacity(64 * 1024);
        let read = stream.read_to_end(&mut buf);
        // The peer has usually closed already; shutdown errors are expected then.
        let _ = stream.shutdown(Shutdown::Both);
        read?;

        log::debug!("read {} bytes from {}", buf.len(), endpoint.address());
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn serve_once(payload: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            if let Ok((mut conn, _)) = listener.accept() {
                conn.write_all(payload).unwrap();
            }
        });
        port
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_fetch_reads_until_close() {
        let port = serve_once(b"<HOST NAME=\"a\" REPORTED=\"1\" />");
        let payload = TcpTransport::new()
            .fetch(&Endpoint::new("127.0.0.1", port, 0))
            .unwrap();
        assert_eq!(payload, "<HOST NAME=\"a\" REPORTED=\"1\" />");
    }

    #[test]
    fn test_fetch_lossy_decodes_invalid_utf8() {
        let port = serve_once(b"ok \xff ok");
        let payload = TcpTransport::new()
            .fetch(&Endpoint::new("127.0.0.1", port, 0))
            .unwrap();
        assert!(payload.starts_with("ok "));
        assert!(payload.ends_with(" ok"));
    }

    #[test]
    fn test_fetch_refused_is_error() {
        let port = closed_port();
        let transport = TcpTransport::new().with_connect_timeout(Some(Duration::from_secs(2)));
        assert!(transport.fetch(&Endpoint::new("127.0.0.1", port, 0)).is_err());
    }

    #[test]
    fn test_zero_timeouts_mean_none() {
        let t = TcpTransport::new()
            .with_connect_timeout(Some(Duration::ZERO))
            .with_read_timeout(Some(Duration::ZERO));
        assert!(t.connect_timeout.is_none());
        assert!(t.read_timeout.is_none());
    }

    #[test]
    fn test_endpoint_address() {
        assert_eq!(Endpoint::new("gmond", 8649, 3).address(), "gmond:8649");
    }
}
