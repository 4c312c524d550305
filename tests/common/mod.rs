//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the mock origin saw in one request.
#[derive(Debug)]
pub struct OriginRequest {
    pub request_line: String,
    pub headers: Vec<String>,
}

impl OriginRequest {
    /// Case-insensitive header lookup, trimmed value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

/// A canned origin response.
pub struct OriginResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub last_modified: Option<&'static str>,
}

impl OriginResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, when: &'static str) -> Self {
        self.last_modified = Some(when);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn not_modified() -> Self {
        Self {
            status: 304,
            content_type: "text/plain",
            body: Vec::new(),
            last_modified: None,
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let reason = match self.status {
            200 => "OK",
            304 => "Not Modified",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "OK",
        };
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason);
        if self.status != 304 {
            head.push_str(&format!("Content-Type: {}\r\n", self.content_type));
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        if let Some(when) = self.last_modified {
            head.push_str(&format!("Last-Modified: {}\r\n", when));
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut raw = head.into_bytes();
        raw.extend_from_slice(&self.body);
        raw
    }
}

/// Start a programmable mock origin. Returns its address and a counter of
/// requests it actually served.
pub async fn start_origin<F, Fut>(f: F) -> (SocketAddr, Arc<AtomicU32>)
where
    F: Fn(OriginRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OriginResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let hit_counter = hits.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let hits = hit_counter.clone();
                    tokio::spawn(async move {
                        let request = read_origin_request(&mut socket).await;
                        hits.fetch_add(1, Ordering::SeqCst);
                        let response = f(request).await;
                        let _ = socket.write_all(&response.serialize()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}

async fn read_origin_request(socket: &mut TcpStream) -> OriginRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    OriginRequest {
        request_line,
        headers,
    }
}

/// Send one raw request through the proxy and collect the full response.
/// The proxy closes the connection after a single exchange, so reading to
/// EOF yields the complete response.
pub async fn send_request(proxy: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

/// The body part of a raw HTTP response.
pub fn body_of(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}
