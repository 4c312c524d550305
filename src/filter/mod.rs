//! Domain filter subsystem.
//!
//! # Data Flow
//! ```text
//! blocklist file (one host substring per line)
//!     → reload() (read, trim, drop blanks)
//!     → atomic swap of the blocked set
//!     → is_blocked() consulted by every in-flight request
//! ```
//!
//! # Design Decisions
//! - Substring match against the whole URL, not hostname equality.
//!   "blocked.test" blocks "http://blocked.test/x" and anything else
//!   containing that text. Intentionally loose.
//! - Reload replaces the set wholesale via `ArcSwap`; concurrent readers
//!   see either the old set or the new one, never a partial set.
//! - A failed reload leaves the previous set in place.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Set of blocked host substrings, shared across all connection handlers.
pub struct DomainFilter {
    blocked: ArcSwap<HashSet<String>>,
    source_path: Option<PathBuf>,
}

impl DomainFilter {
    /// Create an empty filter backed by an optional blocklist file.
    pub fn new(source_path: Option<PathBuf>) -> Self {
        Self {
            blocked: ArcSwap::from_pointee(HashSet::new()),
            source_path,
        }
    }

    /// Returns true iff any blocked substring occurs in `url`.
    pub fn is_blocked(&self, url: &str) -> bool {
        self.blocked.load().iter().any(|domain| url.contains(domain))
    }

    /// Re-read the blocklist file and swap in its contents, clearing
    /// whatever was loaded before. Returns the number of entries loaded.
    ///
    /// With no source path configured this installs an empty set.
    pub fn reload(&self) -> std::io::Result<usize> {
        let domains = match &self.source_path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            None => HashSet::new(),
        };

        let count = domains.len();
        self.blocked.store(Arc::new(domains));
        tracing::info!(entries = count, "Blocklist loaded");
        Ok(count)
    }

    /// Replace the blocked set directly. Used by tests and by callers that
    /// own the list's persistence.
    pub fn replace<I>(&self, domains: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.blocked.store(Arc::new(domains.into_iter().collect()));
    }

    /// Number of blocked substrings currently loaded.
    pub fn len(&self) -> usize {
        self.blocked.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
