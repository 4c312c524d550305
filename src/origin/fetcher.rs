//! Outbound fetching and response relay.

use std::time::{Duration, UNIX_EPOCH};

use futures_util::StreamExt;
use reqwest::{header, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::cache::{now_epoch_millis, CacheStore};
use crate::config::OriginConfig;
use crate::http::response;
use crate::observability::metrics;

/// Error type for origin fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request target did not parse as an absolute http(s) URL.
    #[error("invalid request target `{0}`")]
    Uri(String),
    /// Connect or read deadline elapsed before the response head arrived.
    #[error("origin timed out: {0}")]
    Timeout(reqwest::Error),
    /// Transport failure before the response head arrived.
    #[error("origin I/O failure: {0}")]
    Transport(reqwest::Error),
    /// The origin stream failed after the head was already relayed, so no
    /// error response can be synthesized for the client.
    #[error("origin stream interrupted: {0}")]
    Interrupted(reqwest::Error),
    /// Writing to the client failed.
    #[error("client write failed: {0}")]
    ClientWrite(#[from] std::io::Error),
}

/// What an origin round trip produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Origin confirmed the cached entry is still current.
    NotModified,
    /// A response with this status was relayed to the client.
    Relayed(u16),
}

/// Issues outbound requests and relays responses to the client.
pub struct OriginFetcher {
    client: reqwest::Client,
    max_cacheable_bytes: u64,
}

impl OriginFetcher {
    pub fn new(config: &OriginConfig, max_cacheable_bytes: u64) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .no_proxy()
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            max_cacheable_bytes,
        }
    }

    /// Fetch `target` from its origin and relay the response to
    /// `client_writer`, updating `cache` when the body qualifies.
    ///
    /// When `cached_last_modified` is present the request carries an
    /// `If-Modified-Since` precondition; a 304 answer is reported as
    /// [`FetchOutcome::NotModified`] without touching the client socket.
    pub async fn fetch<W>(
        &self,
        target: &str,
        cached_last_modified: Option<u64>,
        client_writer: &mut W,
        cache: &CacheStore,
    ) -> Result<FetchOutcome, FetchError>
    where
        W: AsyncWrite + Unpin,
    {
        let url = Url::parse(target).map_err(|_| FetchError::Uri(target.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::Uri(target.to_string()));
        }

        let mut request = self.client.get(url);
        if let Some(millis) = cached_last_modified {
            let when = UNIX_EPOCH + Duration::from_millis(millis);
            request = request.header(header::IF_MODIFIED_SINCE, httpdate::fmt_http_date(when));
        }

        let resp = request.send().await.map_err(classify_send_error)?;
        let status = resp.status();
        metrics::record_origin_fetch(status.as_u16());

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(url = %target, "Origin reports not modified");
            return Ok(FetchOutcome::NotModified);
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = resp.content_length();
        let last_modified = resp
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| httpdate::parse_http_date(s).ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or_else(now_epoch_millis);
        let reason = status.canonical_reason().unwrap_or("");

        // Cacheability is decided against the advertised length before any
        // body bytes arrive; only 200 bodies are cache candidates.
        let mut cache_copy: Option<Vec<u8>> = if status == StatusCode::OK {
            match content_length {
                Some(len) if len > self.max_cacheable_bytes => {
                    tracing::info!(
                        url = %target,
                        advertised = len,
                        "Response exceeds cache ceiling, relaying without caching"
                    );
                    metrics::record_cache_skip();
                    None
                }
                _ => Some(Vec::new()),
            }
        } else {
            None
        };

        response::write_relay_head(
            client_writer,
            status.as_u16(),
            reason,
            content_type.as_deref(),
            content_length,
        )
        .await?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::Interrupted)?;
            client_writer.write_all(&chunk).await?;
            if let Some(mut buf) = cache_copy.take() {
                if (buf.len() + chunk.len()) as u64 > self.max_cacheable_bytes {
                    // Undeclared length that turned out oversized.
                    tracing::info!(url = %target, "Response grew past cache ceiling, dropping cache copy");
                    metrics::record_cache_skip();
                } else {
                    buf.extend_from_slice(&chunk);
                    cache_copy = Some(buf);
                }
            }
        }
        client_writer.flush().await?;

        if let Some(buf) = cache_copy {
            cache.put(target.to_string(), normalize_body(&buf), last_modified);
            tracing::debug!(url = %target, bytes = buf.len(), "Cached origin response");
        }

        Ok(FetchOutcome::Relayed(status.as_u16()))
    }
}

fn classify_send_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e)
    } else {
        FetchError::Transport(e)
    }
}

/// Collapse the raw body into newline-joined text: CR/LF pairs become
/// single newlines and the last line always ends with one.
fn normalize_body(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut body = String::with_capacity(text.len() + 1);
    for line in text.lines() {
        body.push_str(line);
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_joins_lines_with_newlines() {
        assert_eq!(normalize_body(b"a\r\nb\r\n"), "a\nb\n");
        assert_eq!(normalize_body(b"a\nb"), "a\nb\n");
        assert_eq!(normalize_body(b""), "");
    }

    #[tokio::test]
    async fn unparsable_target_is_uri_error() {
        let fetcher = OriginFetcher::new(&OriginConfig::default(), 1024);
        let cache = CacheStore::new(Duration::from_secs(60));
        let (mut tx, _rx) = tokio::io::duplex(1024);

        let err = fetcher
            .fetch("not a url", None, &mut tx, &cache)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Uri(_)));

        let err = fetcher
            .fetch("ftp://example.com/file", None, &mut tx, &cache)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Uri(_)));
        assert!(cache.is_empty());
    }
}
