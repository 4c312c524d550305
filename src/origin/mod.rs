//! Origin fetch subsystem.
//!
//! # Data Flow
//! ```text
//! GET target (validated, unblocked, cache-stale or cache-miss)
//!     → fetcher.rs (outbound request, If-Modified-Since when cached)
//!     → 200: relay head + body to the client, buffering one copy
//!             for the cache while the advertised size allows it
//!     → 304: signal the caller to serve the cached entry
//!     → other: relay the origin's real status, headers and body
//! ```
//!
//! # Design Decisions
//! - The body is read exactly once; client relay and cache copy come
//!   from the same pass
//! - Connect and read timeouts bound every outbound call
//! - Timeouts surface as 504, other transport failures as 502

pub mod fetcher;

pub use fetcher::{FetchError, FetchOutcome, OriginFetcher};
