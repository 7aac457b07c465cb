//! Document commands - get, set and show values in structured files

use crate::cli::args::{DocumentArgs, GetArgs, SetArgs, ShowArgs};
use crate::cli::output;
use crate::config::{self, Config};
use crate::document::{open_document, Descriptor, DocumentOptions, DocumentStore};
use crate::error::{StashError, StashResult};
use crate::path::PathAddress;
use serde_json::Value;
use tracing::debug;

/// Execute the get command
pub async fn get(args: GetArgs, config: &Config) -> StashResult<()> {
    PathAddress::parse(&args.address)?;
    let document = open(&args.document, DocumentOptions::from_config(&config.documents));

    let value = document
        .get(&args.address)
        .ok_or_else(|| StashError::NodeMissing {
            address: args.address.clone(),
            path: args.document.file.clone(),
        })?;
    println!("{}", render_value(&value)?);
    Ok(())
}

/// Execute the set command
pub async fn set(args: SetArgs, config: &Config) -> StashResult<()> {
    PathAddress::parse(&args.address)?;
    let mut options = DocumentOptions::from_config(&config.documents);
    if let Some(path) = &args.descriptor {
        options = options.with_descriptor(Descriptor::from_file(path)?);
    }
    let document = open(&args.document, options);

    let value = if args.remove {
        None
    } else {
        args.value.as_deref().map(config::parse_value)
    };
    let removing = value.is_none();
    document.set(&args.address, value)?;

    if !document.save(false) {
        return Err(StashError::SaveFailed(args.document.file.clone()));
    }

    let verb = if removing { "Removed" } else { "Set" };
    output::step_ok_detail(
        &format!("{} {}", verb, args.address),
        &args.document.file.display().to_string(),
    );
    Ok(())
}

/// Execute the show command
pub async fn show(args: ShowArgs, config: &Config) -> StashResult<()> {
    let document = open(&args.document, DocumentOptions::from_config(&config.documents));
    let tree = document
        .snapshot()
        .ok_or_else(|| StashError::NodeMissing {
            address: "(root)".to_string(),
            path: args.document.file.clone(),
        })?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn open(args: &DocumentArgs, options: DocumentOptions) -> Box<dyn DocumentStore> {
    let format = args.format();
    debug!("Opening {} as {}", args.file.display(), format);
    open_document(args.file.clone(), format, options, None)
}

/// Strings print bare so shell scripts can consume them; the rest as JSON
fn render_value(value: &Value) -> StashResult<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        other => Ok(serde_json::to_string_pretty(other)?),
    }
}
