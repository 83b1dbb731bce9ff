use std::{net::SocketAddr, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::search::{DEFAULT_LIMIT, Query};

#[derive(Debug, Parser)]
#[command(
    name = "surveycat",
    about = "Catalog and search wildlife survey files by species, place and survey type"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Catalog configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors and hide progress bars
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk a directory tree and record category matches per file
    Scan(ScanArgs),
    /// Build the search index from a scan and/or metadata exports
    Build(BuildArgs),
    /// Search the index
    Search(SearchArgs),
    /// Show index statistics
    Stats(StatsArgs),
    /// Serve the HTTP query API
    Serve(ServeArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Scan --

#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Root directory to scan
    pub root: PathBuf,

    /// Where to write the scan CSV (defaults to scan.csv in the data dir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// -- Build --

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Scan CSV to index (defaults to scan.csv in the data dir)
    #[arg(long)]
    pub scan: Option<PathBuf>,

    /// Directory holding per-kind metadata exports
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,
}

// -- Search --

/// Parse a `CATEGORY=VALUE` filter.
fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (category, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=VALUE, got '{raw}'"))?;
    let category = category.trim();
    if category.is_empty() {
        return Err(format!("missing category in '{raw}'"));
    }
    Ok((category.to_string(), value.trim().to_string()))
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Free-text query; omit to list matches alphabetically
    #[arg(default_value = "")]
    pub query: String,

    /// Category filter, e.g. --filter marine_mammals=dugong (repeatable)
    #[arg(short, long = "filter", value_name = "CATEGORY=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    /// Only records of this type (table, geodatabase, shapefile, image, document)
    #[arg(short = 't', long)]
    pub file_type: Option<String>,

    /// Keep records whose text or path matches this regex
    #[arg(long)]
    pub include: Option<String>,

    /// Drop records whose text or path matches this regex
    #[arg(long)]
    pub exclude: Option<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn to_query(&self) -> Query {
        Query {
            text: self.query.clone(),
            category_filters: self.filters.iter().cloned().collect(),
            file_type: self.file_type.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            limit: self.limit,
        }
    }
}

// -- Stats --

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Serve --

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "surveycat",
            &mut std::io::stdout(),
        );
    }
}
