//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Tunables are optional here so that values from
//! `.orpheus.toml` only get overridden when a flag is actually given.

use crate::models::{EntityKind, Granularity};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Orpheus - listening-pattern analyzer for Spotify playlist exports
///
/// Reads Exportify CSV exports, finds repeat obsessions and listening
/// rhythms, and writes a Markdown or JSON report.
///
/// Examples:
///   orpheus --input liked_songs.csv
///   orpheus --input exports/ --threshold 5 --kind artist,album
///   orpheus --input liked_songs.csv --granularity week --format json
///   orpheus --input liked_songs.csv --enrich
///   orpheus --input liked_songs.csv --dry-run
///   orpheus --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Export file or directory of exports to analyze
    ///
    /// A directory is scanned for *.csv files; all of them are merged.
    #[arg(short, long, value_name = "PATH", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Minimum play count for an obsession
    #[arg(short, long, value_name = "COUNT")]
    pub threshold: Option<usize>,

    /// Keep at most this many obsessions per kind (0 keeps all)
    #[arg(long, value_name = "COUNT")]
    pub top_n: Option<usize>,

    /// Entity kinds to rank (comma-separated)
    ///
    /// Example: --kind artist,album
    #[arg(short, long, value_name = "KINDS", value_delimiter = ',')]
    pub kind: Option<Vec<KindArg>>,

    /// Calendar bucket size for the listening histogram
    #[arg(short, long, value_name = "SIZE")]
    pub granularity: Option<GranularityArg>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .orpheus.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fetch missing audio features from the Spotify Web API
    #[arg(long)]
    pub enrich: bool,

    /// Spotify client id for enrichment
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub spotify_client_id: Option<String>,

    /// Spotify client secret for enrichment
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// Track ids per audio-features request (1-100)
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Keep rows that lack a track or artist name
    #[arg(long)]
    pub keep_incomplete: bool,

    /// Leave text bar charts out of the Markdown report
    #[arg(long)]
    pub no_charts: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load and clean the exports without analyzing them
    ///
    /// Prints the cleaning summary and schema validation, then exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .orpheus.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Entity kind accepted by --kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    Artist,
    Track,
    Album,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Artist => EntityKind::Artist,
            KindArg::Track => EntityKind::Track,
            KindArg::Album => EntityKind::Album,
        }
    }
}

/// Bucket size accepted by --granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GranularityArg {
    Day,
    Week,
    Month,
    Year,
}

impl From<GranularityArg> for Granularity {
    fn from(granularity: GranularityArg) -> Self {
        match granularity {
            GranularityArg::Day => Granularity::Day,
            GranularityArg::Week => Granularity::Week,
            GranularityArg::Month => Granularity::Month,
            GranularityArg::Year => Granularity::Year,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.threshold == Some(0) {
            return Err("Threshold must be at least 1".to_string());
        }

        if let Some(size) = self.batch_size {
            if !(1..=100).contains(&size) {
                return Err("Batch size must be between 1 and 100".to_string());
            }
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                Err(format!("Input path does not exist: {}", input.display()))
            }
            Some(_) => Ok(()),
            None => Err("An --input path is required".to_string()),
        }
    }

    /// Entity kinds requested on the command line, if any.
    pub fn kinds(&self) -> Option<Vec<EntityKind>> {
        self.kind
            .as_ref()
            .map(|kinds| kinds.iter().map(|&k| EntityKind::from(k)).collect())
    }
}
