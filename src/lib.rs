//! docstash - lazily loaded structured documents and a disk-backed
//! content cache
//!
//! Documents (properties, JSON, YAML) are loaded on first touch, addressed
//! with dotted paths like `server.hosts[-1]`, written back on demand and
//! invalidated when edited externally. Fetched content is cached on disk
//! with a TTL and served stale when renewal fails.

pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod either;
pub mod error;
pub mod fetch;
pub mod path;
pub mod watch;

pub use error::{StashError, StashResult};
