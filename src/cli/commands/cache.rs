//! Cache command - inspect and prune the content cache

use crate::cache::{CacheEntryInfo, CacheOptions, ContentCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::output;
use crate::config::Config;
use crate::error::StashResult;
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> StashResult<()> {
    let cache = ContentCache::open(CacheOptions::for_config(config)).await?;

    match args.action {
        CacheAction::List { format } => list_entries(&cache, format)?,
        CacheAction::Remove { key } => {
            if cache.remove(&key).await {
                output::step_ok(&format!("Removed {}", key));
            } else {
                output::step_warn_hint(&format!("{} is not cached", key), "Run: docstash cache list");
            }
        }
        CacheAction::Purge => {
            let purged = cache.purge_expired().await;
            output::step_ok(&format!("Purged {} expired entr{}", purged, plural(purged)));
        }
        CacheAction::Clear => {
            let cleared = cache.clear().await;
            output::step_ok(&format!("Cleared {} entr{}", cleared, plural(cleared)));
        }
        CacheAction::Path => println!("{}", cache.dir().display()),
    }

    cache.flush().await;
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

fn list_entries(cache: &ContentCache, format: OutputFormat) -> StashResult<()> {
    let entries = cache.entries();

    match format {
        OutputFormat::Table => print_entry_table(cache, &entries),
        OutputFormat::Json => print_entry_json(&entries)?,
        OutputFormat::Plain => print_entry_plain(&entries),
    }
    Ok(())
}

fn print_entry_table(cache: &ContentCache, entries: &[CacheEntryInfo]) {
    if entries.is_empty() {
        println!("No cached entries.");
        output::key_value("directory", &cache.dir().display().to_string());
        return;
    }

    println!("{:<50} {:<10} {:<10} {:<20}", "KEY", "STATE", "SIZE", "EXPIRES");
    println!("{}", "-".repeat(92));

    for entry in entries {
        let state = if entry.expired {
            style("expired").yellow().to_string()
        } else {
            style("fresh").green().to_string()
        };
        let size = entry
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| style("missing").red().to_string());
        let expires = entry
            .expires_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        println!(
            "{:<50} {:<10} {:<10} {:<20}",
            truncate(&entry.key, 50),
            state,
            size,
            expires
        );
    }

    println!();
    println!("Total: {} entr{}", entries.len(), plural(entries.len()));
}

fn print_entry_json(entries: &[CacheEntryInfo]) -> StashResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        key: &'a str,
        blob: &'a str,
        expired: bool,
        expires_at: Option<String>,
        size: Option<u64>,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            key: &e.key,
            blob: &e.blob,
            expired: e.expired,
            expires_at: e.expires_at.map(|t| t.to_rfc3339()),
            size: e.size,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_entry_plain(entries: &[CacheEntryInfo]) {
    for entry in entries {
        println!("{}", entry.key);
    }
}

fn truncate(key: &str, width: usize) -> String {
    if key.chars().count() <= width {
        return key.to_string();
    }
    let kept: String = key.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
