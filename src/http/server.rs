//! Proxy server setup and per-connection dispatch.
//!
//! # Responsibilities
//! - Own the shared cache, filter and fetcher handles
//! - Bind the listener once and accept until stopped
//! - Run the request pipeline per connection:
//!   parse → filter → method check → cache/fetch or echo
//! - Expose the operator control surface (start/stop/running/connections)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::filter::DomainFilter;
use crate::http::request::{self, parse_request_line, RequestError};
use crate::http::response::{self, ErrorStatus};
use crate::net::connection::{ConnectionId, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;
use crate::origin::{FetchError, FetchOutcome, OriginFetcher};

/// Headers are drained, never parsed; a client that sends more than this
/// many lines before the blank line is cut off.
const MAX_HEADER_LINES: usize = 100;

/// Shared state handed to every connection handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheStore,
    pub filter: Arc<DomainFilter>,
    pub fetcher: Arc<OriginFetcher>,
}

/// The caching forward proxy.
#[derive(Clone)]
pub struct ProxyServer {
    state: AppState,
    config: ProxyConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    connections: ConnectionTracker,
}

impl ProxyServer {
    /// Create a server with the given configuration. The cache, filter and
    /// fetcher are owned here and injected into each connection handler.
    pub fn new(config: ProxyConfig) -> Self {
        let cache = CacheStore::new(Duration::from_secs(config.cache.ttl_secs));
        let filter = Arc::new(DomainFilter::new(
            config.filter.blocklist_path.as_ref().map(PathBuf::from),
        ));
        let fetcher = Arc::new(OriginFetcher::new(
            &config.origin,
            config.cache.max_entry_bytes,
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            state: AppState {
                cache,
                filter,
                fetcher,
            },
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            connections: ConnectionTracker::new(),
        }
    }

    /// Bind on the configured address and the given port, then accept in a
    /// background task until [`stop`](Self::stop). Returns the bound
    /// address (useful with port 0).
    pub async fn start(&self, port: u16) -> Result<SocketAddr, ListenerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::Bind(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "proxy already running",
            )));
        }

        let listener = match Listener::bind(&self.config.listener.bind_address, port).await {
            Ok(listener) => listener,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(ListenerError::Bind(e));
            }
        };

        let shutdown_rx = self.shutdown_tx.subscribe();
        let server = self.clone();
        tokio::spawn(async move { server.run(listener, shutdown_rx).await });

        tracing::info!(address = %addr, "Proxy server is listening");
        Ok(addr)
    }

    /// Clear the running flag and close the listening socket. In-flight
    /// connections are not interrupted; they run to completion.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        tracing::info!("Proxy server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// Re-read the blocklist file into the filter.
    pub fn reload_blocklist(&self) -> std::io::Result<usize> {
        self.state.filter.reload()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.state.cache
    }

    pub fn filter(&self) -> &DomainFilter {
        &self.state.filter
    }

    /// Accept loop. Each accepted connection is handled in its own task so
    /// a stalled client never blocks accept. Transient accept errors are
    /// logged and the loop continues; only the shutdown signal ends it,
    /// which also drops (closes) the listening socket. The running flag
    /// belongs to start/stop; the loop never writes it.
    pub async fn run(&self, listener: Listener, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Accept loop stopping");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _peer)) => {
                        let guard = self.connections.track();
                        let state = self.state.clone();
                        tokio::spawn(async move {
                            let id = guard.id();
                            if let Err(e) = handle_connection(stream, state, id).await {
                                tracing::debug!(
                                    connection_id = %id,
                                    error = %e,
                                    "Connection ended with I/O error"
                                );
                            }
                            drop(guard);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Error accepting client connection");
                    }
                }
            }
        }
    }
}

/// Handle one client connection: exactly one request, one response, then
/// close. Precedence: malformed → blocked → unsupported method → dispatch.
async fn handle_connection(
    stream: TcpStream,
    state: AppState,
    id: ConnectionId,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;

    let parsed = if n == 0 {
        // Client closed without sending a request line.
        Err(RequestError::Malformed)
    } else {
        parse_request_line(&line)
    };

    let req = match parsed {
        Ok(req) => req,
        Err(_) => {
            tracing::debug!(connection_id = %id, "Malformed request line");
            metrics::record_request("-", 400);
            return response::write_error(&mut write_half, ErrorStatus::BadRequest).await;
        }
    };

    // Consume the header block before answering so the close does not race
    // the client's in-flight writes.
    drain_headers(&mut reader).await?;

    tracing::info!(
        connection_id = %id,
        method = %req.method,
        url = %req.target,
        "Handling request"
    );

    if state.filter.is_blocked(&req.target) {
        tracing::info!(connection_id = %id, url = %req.target, "Blocked by domain filter");
        metrics::record_request(&req.method, 401);
        return response::write_error(&mut write_half, ErrorStatus::Unauthorized).await;
    }

    if !request::is_supported(&req.method) {
        metrics::record_request(&req.method, 405);
        return response::write_error(&mut write_half, ErrorStatus::MethodNotAllowed).await;
    }

    if req.method == "GET" {
        handle_get(&req.target, &mut write_half, &state, id).await
    } else {
        metrics::record_request(&req.method, 200);
        response::write_simple(&mut write_half, &req.method, &req.target).await
    }
}

/// GET dispatch: fresh cache hit, or origin fetch with optional
/// revalidation. A 304 from the origin overrides the elapsed freshness
/// window and serves the stored entry.
async fn handle_get<W>(
    target: &str,
    writer: &mut W,
    state: &AppState,
    id: ConnectionId,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if let Some(entry) = state.cache.get(target) {
        if !state.cache.is_expired(&entry) {
            tracing::info!(connection_id = %id, url = %target, "Serving from cache");
            metrics::record_cache_hit();
            metrics::record_request("GET", 200);
            return response::write_cached(writer, &entry.body).await;
        }
        tracing::debug!(connection_id = %id, url = %target, "Cache entry stale, revalidating");
    }
    metrics::record_cache_miss();

    let conditional = state.cache.last_modified(target);
    match state
        .fetcher
        .fetch(target, conditional, writer, &state.cache)
        .await
    {
        Ok(FetchOutcome::Relayed(status)) => {
            metrics::record_request("GET", status);
            Ok(())
        }
        Ok(FetchOutcome::NotModified) => match state.cache.get(target) {
            Some(entry) => {
                tracing::info!(
                    connection_id = %id,
                    url = %target,
                    "Origin unchanged, serving cached entry"
                );
                metrics::record_request("GET", 200);
                response::write_cached(writer, &entry.body).await
            }
            None => {
                // 304 answered an unconditional request; nothing to serve.
                tracing::warn!(connection_id = %id, url = %target, "Origin sent 304 with no cached entry");
                metrics::record_request("GET", 502);
                response::write_error(writer, ErrorStatus::BadGateway).await
            }
        },
        Err(FetchError::Uri(_)) => {
            tracing::debug!(connection_id = %id, url = %target, "Unparsable request target");
            metrics::record_request("GET", 400);
            response::write_error(writer, ErrorStatus::BadRequest).await
        }
        Err(FetchError::Timeout(e)) => {
            tracing::warn!(connection_id = %id, url = %target, error = %e, "Origin timed out");
            metrics::record_request("GET", 504);
            response::write_error(writer, ErrorStatus::GatewayTimeout).await
        }
        Err(FetchError::Transport(e)) => {
            tracing::warn!(connection_id = %id, url = %target, error = %e, "Origin fetch failed");
            metrics::record_request("GET", 502);
            response::write_error(writer, ErrorStatus::BadGateway).await
        }
        Err(e @ (FetchError::Interrupted(_) | FetchError::ClientWrite(_))) => {
            // The response head is already on the wire; all that is left
            // is to close.
            tracing::debug!(connection_id = %id, url = %target, error = %e, "Relay aborted mid-stream");
            Ok(())
        }
    }
}

/// Read and discard header lines up to the blank line ending the block.
async fn drain_headers<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    for _ in 0..MAX_HEADER_LINES {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }
    Ok(())
}
