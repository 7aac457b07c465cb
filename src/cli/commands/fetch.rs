//! Fetch command - fetch a URL through the content cache

use crate::cache::{CacheOptions, ContentCache};
use crate::cli::args::FetchArgs;
use crate::cli::output;
use crate::config::Config;
use crate::either::Either;
use crate::error::{StashError, StashResult};
use crate::fetch::fetch_text;
use std::io::Write;
use std::time::Duration;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> StashResult<()> {
    let mut options = CacheOptions::for_config(config);
    if let Some(ttl) = args.ttl {
        options = options.with_ttl(Duration::from_secs(ttl));
    }
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(options.renew_timeout);

    let cache = ContentCache::open(options).await?;
    let lookup = cache
        .lookup(&args.url, timeout, |url| async move {
            fetch_text(&url, timeout).await.map(Some)
        })
        .await;
    cache.flush().await;

    let content = match lookup {
        Some(Either::Left(content)) => content,
        Some(Either::Right(stale)) => {
            output::remark(&format!("Serving stale content for {}", args.url));
            stale
        }
        None => return Err(StashError::CacheMiss(args.url)),
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(content.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|e| StashError::io("writing content to stdout", e))
}
