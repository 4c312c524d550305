//! Client-side response emission.
//!
//! Minimal HTTP/1.1 writers for the four response shapes the proxy
//! produces: errors, simple non-GET echoes, cached hits, and relayed
//! origin responses. Every writer flushes before returning; the handler
//! closes the socket afterwards.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Client-facing error statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    BadRequest,
    Unauthorized,
    MethodNotAllowed,
    BadGateway,
    GatewayTimeout,
}

impl ErrorStatus {
    pub fn code(self) -> u16 {
        match self {
            ErrorStatus::BadRequest => 400,
            ErrorStatus::Unauthorized => 401,
            ErrorStatus::MethodNotAllowed => 405,
            ErrorStatus::BadGateway => 502,
            ErrorStatus::GatewayTimeout => 504,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            ErrorStatus::BadRequest => "Bad Request",
            ErrorStatus::Unauthorized => "Unauthorized",
            ErrorStatus::MethodNotAllowed => "Method Not Allowed",
            ErrorStatus::BadGateway => "Bad Gateway",
            ErrorStatus::GatewayTimeout => "Gateway Timeout",
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Error response: status line, text/html content type, one-line body
/// naming the status. No diagnostics leak to the client.
pub async fn write_error<W>(writer: &mut W, status: ErrorStatus) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\n\r\n<html><body><h1>{status}</h1></body></html>\r\n"
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

/// Simple 200 for allowed non-GET methods. OPTIONS advertises the method
/// set; HEAD and OPTIONS carry no body; anything else echoes the target.
pub async fn write_simple<W>(writer: &mut W, method: &str, target: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(b"HTTP/1.1 200 OK\r\n").await?;
    if method == "OPTIONS" {
        writer
            .write_all(b"Allow: GET, HEAD, OPTIONS, POST\r\n")
            .await?;
    }
    writer
        .write_all(b"Content-Type: text/html; charset=utf-8\r\n\r\n")
        .await?;
    if method != "HEAD" && method != "OPTIONS" {
        let body = format!("<html><body><h1>Requested URL: {target}</h1></body></html>\r\n");
        writer.write_all(body.as_bytes()).await?;
    }
    writer.flush().await
}

/// Cached hit: the stored text verbatim, framed by connection close.
pub async fn write_cached<W>(writer: &mut W, body: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\r\n")
        .await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await
}

/// Head of a relayed origin response: real status, and the origin's
/// content type and length when it sent them. The body bytes follow and
/// the caller flushes once they are written.
pub async fn write_relay_head<W>(
    writer: &mut W,
    status: u16,
    reason: &str,
    content_type: Option<&str>,
    content_length: Option<u64>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("HTTP/1.1 {status} {reason}\r\n").as_bytes())
        .await?;
    if let Some(content_type) = content_type {
        writer
            .write_all(format!("Content-Type: {content_type}\r\n").as_bytes())
            .await?;
    }
    if let Some(content_length) = content_length {
        writer
            .write_all(format!("Content-Length: {content_length}\r\n").as_bytes())
            .await?;
    }
    writer.write_all(b"\r\n").await
}
