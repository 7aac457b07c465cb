//! CLI command implementations

pub mod cache;
pub mod config;
pub mod document;
pub mod fetch;
pub mod watch;

pub use cache::execute as cache;
pub use config::execute as config;
pub use document::{get, set, show};
pub use fetch::execute as fetch;
pub use watch::execute as watch;
