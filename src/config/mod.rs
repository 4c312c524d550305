//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via the server handle to all subsystems
//!
//! CLI overrides (port, blocklist path) are applied on top of the
//! loaded config before the server is constructed.
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CacheConfig;
pub use schema::FilterConfig;
pub use schema::ListenerConfig;
pub use schema::OriginConfig;
pub use schema::ProxyConfig;
