//! CLI argument definitions using clap derive

use crate::document::DocumentFormat;
use crate::watch::WatchMode;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// docstash - structured documents and a disk-backed content cache
///
/// Reads and edits properties, JSON and YAML files by dotted address, and
/// caches fetched content with a TTL and stale fallback.
#[derive(Parser, Debug)]
#[command(name = "docstash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DOCSTASH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a value from a document
    Get(GetArgs),

    /// Write or remove a value in a document
    Set(SetArgs),

    /// Print a whole document as JSON
    Show(ShowArgs),

    /// Fetch a URL through the content cache
    Fetch(FetchArgs),

    /// Report changes to a file until interrupted
    Watch(WatchArgs),

    /// Inspect or prune the content cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Document file and encoding, shared by document commands
#[derive(Parser, Debug)]
pub struct DocumentArgs {
    /// Document file
    pub file: PathBuf,

    /// Encoding (defaults to the file extension; unknown means properties)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,
}

impl DocumentArgs {
    pub fn format(&self) -> DocumentFormat {
        self.format
            .map(DocumentFormat::from)
            .unwrap_or_else(|| DocumentFormat::from_path(&self.file))
    }
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Node address, e.g. server.hosts[-1]
    pub address: String,
}

/// Arguments for the set command
#[derive(Parser, Debug)]
#[command(group(clap::ArgGroup::new("change").required(true).args(["value", "remove"])))]
pub struct SetArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Node address, e.g. server.hosts[0]
    pub address: String,

    /// New value, parsed as JSON when possible and as a string otherwise
    pub value: Option<String>,

    /// Remove the node instead of writing it
    #[arg(long)]
    pub remove: bool,

    /// Descriptor (JSON or YAML) whose defaults are filled in on save
    #[arg(long)]
    pub descriptor: Option<PathBuf>,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub document: DocumentArgs,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL to fetch
    pub url: String,

    /// Freshness window in seconds (default: from config)
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Renewal timeout in seconds (default: from config)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the watch command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// File to watch
    pub file: PathBuf,

    /// Watch backend (default: from config)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Forget one cached key
    Remove {
        /// Cache key (usually a URL)
        key: String,
    },

    /// Remove expired entries and orphaned blobs
    Purge,

    /// Remove every cached entry
    Clear,

    /// Show the cache directory
    Path,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.ttl_secs)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Document encodings selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Properties,
    Json,
    Yaml,
}

impl From<FormatArg> for DocumentFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Properties => Self::Properties,
            FormatArg::Json => Self::Json,
            FormatArg::Yaml => Self::Yaml,
        }
    }
}

/// Watch backends selectable on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Native,
    Polling,
}

impl From<ModeArg> for WatchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Native => Self::Native,
            ModeArg::Polling => Self::Polling,
        }
    }
}
