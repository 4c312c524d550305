//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind once, accept loop)
//!     → connection.rs (id + active-count tracking)
//!     → Hand off to the per-connection handler in http::server
//! ```
//!
//! # Design Decisions
//! - One spawned task per connection; a stalled client never blocks accept
//! - No concurrent-connection ceiling; connections are tracked but not capped
//! - Accept errors are logged and the loop continues; only shutdown ends it

pub mod connection;
pub mod listener;
