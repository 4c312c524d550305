//! Caching Forward HTTP Proxy Library

pub mod cache;
pub mod config;
pub mod filter;
pub mod http;
pub mod net;
pub mod observability;
pub mod origin;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
