//! Watch command - report changes to one file until interrupted

use crate::cli::args::WatchArgs;
use crate::cli::output;
use crate::config::Config;
use crate::error::{StashError, StashResult};
use crate::watch::{build_source, WatchMode};
use chrono::Local;
use console::style;
use std::path::Path;
use std::sync::Arc;

/// Execute the watch command
pub async fn execute(args: WatchArgs, config: &Config) -> StashResult<()> {
    let settings = &config.documents.watch;
    let mode = args.mode.map(WatchMode::from).unwrap_or(settings.mode);
    let source = build_source(mode, settings.poll_interval())?;

    let subscription = source.subscribe(
        &args.file,
        Arc::new(|changed: &Path| {
            println!(
                "{} {}",
                style(Local::now().format("%H:%M:%S")).dim(),
                changed.display()
            );
        }),
    )?;

    output::step_info(&format!(
        "Watching {} ({}), press Ctrl-C to stop",
        subscription.path().display(),
        source.name()
    ));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| StashError::io("waiting for Ctrl-C", e))?;
    drop(subscription);
    Ok(())
}
