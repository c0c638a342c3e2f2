//! Command-line interface for hiercc-assign.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **assign**: Assign allele profiles to their closest reference ST
//! - **database build**: Build a profile database from scheme exports
//! - **database info**: Describe a built database
//! - **serve**: Start the HTTP assignment service
//!
//! ## Usage
//!
//! ```text
//! # Build a database
//! hiercc-assign database build --profiles profiles.tsv --hiercc hiercc.tsv \
//!     --alleles-dir alleles/ --output db/
//!
//! # Assign profiles from a file
//! hiercc-assign assign queries.json --database db/
//!
//! # Pipe JSON Lines from another tool
//! cat queries.jsonl | hiercc-assign assign - -d db/ --format tsv
//!
//! # Start the service
//! hiercc-assign serve --database db/ --port 8080
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::GapLimit;
use crate::matching::engine::{DEFAULT_EF_SEARCH, DEFAULT_SHORTLIST_SIZE};
use crate::matching::{AssignConfig, SearchStrategy};

pub mod assign;
pub mod database;

#[derive(Parser)]
#[command(name = "hiercc-assign")]
#[command(version)]
#[command(about = "Assign cgMLST allele profiles to the closest known ST and infer HierCC codes")]
#[command(
    long_about = "hiercc-assign finds the closest known sequence type for a cgMLST allele profile.\n\nIt compares the profile against a prebuilt database of reference STs and reports:\n- The closest ST and its allele distance\n- Loci missing in the query, the reference, or both\n- HierCC cluster codes at every level the distance allows"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assign allele profiles to reference STs
    Assign(assign::AssignArgs),

    /// Build or inspect a profile database
    Database(database::DatabaseArgs),

    /// Start the web server
    Serve(ServeArgs),
}

/// Search settings shared by `assign` and `serve`
#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    /// Number of references shortlisted by the similarity index
    #[arg(short = 'k', long, default_value_t = DEFAULT_SHORTLIST_SIZE)]
    pub shortlist_size: usize,

    /// Search breadth of the similarity index (raised to the shortlist size if lower)
    #[arg(long, default_value_t = DEFAULT_EF_SEARCH)]
    pub ef_search: usize,

    /// Candidate search strategy
    #[arg(long, value_enum, default_value = "indexed")]
    pub strategy: SearchStrategy,

    /// Ignore references with this many gaps or more against the query
    /// (default: the limit the database was built with)
    #[arg(short = 'g', long, conflicts_with = "no_gap_limit")]
    pub max_gaps: Option<usize>,

    /// Consider references regardless of their gaps against the query
    #[arg(long)]
    pub no_gap_limit: bool,
}

impl SearchArgs {
    #[must_use]
    pub fn to_config(&self) -> AssignConfig {
        AssignConfig {
            shortlist_size: self.shortlist_size.max(1),
            ef_search: self.ef_search,
            strategy: self.strategy,
            max_gaps: gap_limit(self.max_gaps, self.no_gap_limit),
        }
    }
}

/// Gap limit from a `--max-*` value and its `--no-*-limit` opt-out
#[must_use]
pub fn gap_limit(limit: Option<usize>, unlimited: bool) -> GapLimit {
    match (limit, unlimited) {
        (_, true) => GapLimit::Unlimited,
        (Some(limit), false) => GapLimit::Fixed(limit),
        (None, false) => GapLimit::Scheme,
    }
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Database directory
    #[arg(short, long, default_value = "db")]
    pub database: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
