//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET dispatch
//!     → store.get(url): fresh entry → served directly
//!     → stale or absent → origin fetch (conditional when a timestamp exists)
//!     → successful fetch under the size ceiling → store.put(url, ...)
//! ```
//!
//! # Design Decisions
//! - Per-key concurrent writes via DashMap; a refetch overwrites in place
//! - No eviction and no persistence; the map lives and dies with the process
//! - Staleness is a property of the entry, so it cannot be asked of a
//!   missing key

pub mod store;

pub use store::{now_epoch_millis, CacheEntry, CacheStore};
