//! embassy-net backed implementation of the fetch worker's HTTP
//! contract.
//!
//! Artwork comes from the home-automation hub over plain HTTP on the
//! local network, so this stays a thin GET adapter: resolve, connect,
//! send one request, parse the status line and Content-Length, then
//! hand the body stream to the worker. One request at a time, exactly
//! as the `ImageSource` contract requires.

use artpanel::artwork::ImageSource;
use artpanel::config;
use artpanel::error::FetchError;
use core::fmt::Write;
use defmt::warn;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Duration;
use static_cell::StaticCell;

/// Header scratch: status line + headers of any sane artwork response.
const HEADER_BUF: usize = 1024;

struct OpenResponse {
    status: u16,
    content_length: Option<usize>,
    /// Body bytes that arrived in the same segments as the headers.
    leftover: (usize, usize),
}

pub struct HttpImageSource {
    stack: Stack<'static>,
    socket: TcpSocket<'static>,
    header: [u8; HEADER_BUF],
    open: Option<OpenResponse>,
}

impl HttpImageSource {
    /// Must be called exactly once; the socket buffers are statics.
    pub fn new(stack: Stack<'static>) -> Self {
        static RX: StaticCell<[u8; 8192]> = StaticCell::new();
        static TX: StaticCell<[u8; 1024]> = StaticCell::new();
        let mut socket = TcpSocket::new(stack, RX.init([0; 8192]), TX.init([0; 1024]));
        socket.set_timeout(Some(Duration::from_millis(config::HTTP_TIMEOUT_MS)));
        Self {
            stack,
            socket,
            header: [0; HEADER_BUF],
            open: None,
        }
    }

    async fn connect_inner(&mut self, url: &str) -> Result<u16, FetchError> {
        let (host, port, path) = split_url(url).ok_or(FetchError::Connect)?;

        let address = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|_| FetchError::Connect)?
            .first()
            .copied()
            .ok_or(FetchError::Connect)?;

        self.socket
            .connect(IpEndpoint::new(address, port))
            .await
            .map_err(|_| FetchError::Connect)?;

        let mut request: heapless::String<512> = heapless::String::new();
        write!(
            &mut request,
            "GET {path} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: artpanel/1.0\r\nConnection: close\r\n\r\n"
        )
        .map_err(|_| FetchError::Connect)?;

        write_all(&mut self.socket, request.as_bytes()).await?;

        let response = self.read_header().await?;
        let status = response.status;
        self.open = Some(response);
        Ok(status)
    }

    /// Read until the blank line, parse status + Content-Length, and
    /// remember any body bytes that came along.
    async fn read_header(&mut self) -> Result<OpenResponse, FetchError> {
        let mut filled = 0;
        loop {
            if filled == self.header.len() {
                // Header larger than our scratch: treat as connect failure.
                return Err(FetchError::Connect);
            }
            let n = self
                .socket
                .read(&mut self.header[filled..])
                .await
                .map_err(|_| FetchError::Connect)?;
            if n == 0 {
                return Err(FetchError::Connect);
            }
            filled += n;

            if let Some(end) = find_header_end(&self.header[..filled]) {
                let head = &self.header[..end];
                let status = parse_status(head).ok_or(FetchError::Connect)?;
                let content_length = parse_content_length(head);
                return Ok(OpenResponse {
                    status,
                    content_length,
                    leftover: (end + 4, filled),
                });
            }
        }
    }
}

impl ImageSource for HttpImageSource {
    async fn connect(&mut self, url: &str) -> Result<u16, FetchError> {
        // Recycle the socket from any previous request.
        self.close();
        self.socket.flush().await.ok();

        self.connect_inner(url).await.inspect_err(|_| {
            warn!("http connect to {} failed", url);
            self.socket.abort();
        })
    }

    fn content_length(&self) -> Option<usize> {
        self.open.as_ref().and_then(|r| r.content_length)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FetchError> {
        let open = self.open.as_mut().ok_or(FetchError::Connect)?;

        // Serve body bytes that arrived with the headers first.
        let (start, end) = open.leftover;
        if start < end {
            let n = (end - start).min(buf.len());
            buf[..n].copy_from_slice(&self.header[start..start + n]);
            open.leftover = (start + n, end);
            return Ok(n);
        }

        self.socket.read(buf).await.map_err(|_| FetchError::Connect)
    }

    fn close(&mut self) {
        self.open = None;
        self.socket.abort();
    }
}

async fn write_all(socket: &mut TcpSocket<'static>, mut data: &[u8]) -> Result<(), FetchError> {
    while !data.is_empty() {
        let n = socket.write(data).await.map_err(|_| FetchError::Connect)?;
        data = &data[n..];
    }
    socket.flush().await.map_err(|_| FetchError::Connect)
}

/// Split `http://host[:port]/path` into its parts. TLS is not spoken
/// here; the hub serves artwork over plain HTTP on the LAN.
fn split_url(url: &str) -> Option<(&str, u16, &str)> {
    let rest = url.strip_prefix("http://")?;
    let (authority, path_at) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.split_once(':') {
        Some((h, p)) => (h, p.parse().ok()?),
        None => (authority, 80),
    };
    if host.is_empty() {
        return None;
    }
    Some((host, port, path_at))
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse "HTTP/1.1 200 OK" out of the status line.
fn parse_status(head: &[u8]) -> Option<u16> {
    let line = head.split(|&b| b == b'\r').next()?;
    let text = core::str::from_utf8(line).ok()?;
    let code = text.split(' ').nth(1)?;
    code.parse().ok()
}

fn parse_content_length(head: &[u8]) -> Option<usize> {
    for line in head.split(|&b| b == b'\n') {
        let Ok(text) = core::str::from_utf8(line) else {
            continue;
        };
        let Some((name, value)) = text.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            return value.trim().parse().ok();
        }
    }
    None
}
