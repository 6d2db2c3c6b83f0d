//! Wire transport for record writes
//!
//! The request target of a record write is a logical URL such as
//! `screenshot:https://example.com/`, which HTTP client libraries refuse to
//! send. The proxy only needs a plain HTTP/1.1 request line, so the production
//! transport writes one directly on a TCP connection to the proxy.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::utils::WRITE_RECORD_METHOD;

/// One record write as it goes on the wire
#[derive(Debug, Clone)]
pub struct WriteRecordRequest<'a> {
    /// Logical URL of the record (request target)
    pub url: &'a str,
    /// Header name/value pairs, in order
    pub headers: Vec<(&'static str, String)>,
    pub payload: &'a [u8],
}

impl WriteRecordRequest<'_> {
    /// Value of the first header with this name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends a record write to the proxy and returns the response status code
pub trait RecordTransport: Send + Sync {
    fn send(&self, request: &WriteRecordRequest<'_>, timeout: Duration) -> io::Result<u16>;
}

/// HTTP/1.1 over a fresh TCP connection per record
#[derive(Debug, Clone)]
pub struct TcpRecordTransport {
    proxy_addr: String,
}

impl TcpRecordTransport {
    #[must_use]
    pub fn new(proxy_addr: impl Into<String>) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
        }
    }

    fn connect(&self, timeout: Duration) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.proxy_addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} did not resolve to any address", self.proxy_addr),
            )
        }))
    }
}

fn check_header_safe(value: &str) -> io::Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "header or request target contains a line break",
        ));
    }
    Ok(())
}

/// Parse the status code out of an HTTP/1.x status line
pub(crate) fn parse_status_line(line: &str) -> io::Result<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("not an HTTP status line: {:?}", line.trim_end()),
        ));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("missing status code in {:?}", line.trim_end()),
            )
        })
}

impl RecordTransport for TcpRecordTransport {
    fn send(&self, request: &WriteRecordRequest<'_>, timeout: Duration) -> io::Result<u16> {
        if request.url.contains(char::is_whitespace) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record URL contains whitespace: {:?}", request.url),
            ));
        }

        let stream = self.connect(timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        write!(writer, "{WRITE_RECORD_METHOD} {} HTTP/1.1\r\n", request.url)?;
        for (name, value) in &request.headers {
            check_header_safe(value)?;
            write!(writer, "{name}: {value}\r\n")?;
        }
        write!(writer, "Content-Length: {}\r\n", request.payload.len())?;
        write!(writer, "Connection: close\r\n\r\n")?;
        writer.write_all(request.payload)?;
        writer.flush()?;

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        if reader.read_line(&mut status_line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "proxy closed the connection without a response",
            ));
        }
        parse_status_line(&status_line)
    }
}
