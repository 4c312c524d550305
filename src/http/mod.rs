//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one task per connection)
//!     → request.rs (parse the request line, reject malformed input)
//!     → filter / method checks (malformed → blocked → unsupported → dispatch)
//!     → cache lookup ∘ origin fetch (GET) or echo (HEAD/OPTIONS/POST)
//!     → response.rs (status line + headers + body, fully flushed)
//!     → Close. One request per connection, no keep-alive.
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{parse_request_line, InboundRequest, RequestError};
pub use server::ProxyServer;
