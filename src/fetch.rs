//! Plain fetch-by-address over HTTP(S)
//!
//! Used as the content cache's renewal callback by the CLI.

use crate::error::{StashError, StashResult};
use std::time::Duration;
use tracing::debug;

/// Fetch `url` as text, giving up after `timeout`
pub async fn fetch_text(url: &str, timeout: Duration) -> StashResult<String> {
    let owned = url.to_string();
    tokio::task::spawn_blocking(move || fetch_blocking(&owned, timeout))
        .await
        .map_err(|e| StashError::Internal(format!("fetch task failed: {}", e)))?
}

fn fetch_blocking(url: &str, timeout: Duration) -> StashResult<String> {
    debug!("Fetching {}", url);
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into();

    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| StashError::fetch(url, e.to_string()))?;
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| StashError::fetch(url, e.to_string()))?;

    debug!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}
