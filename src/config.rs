//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.orpheus.toml` files.

use crate::analysis::AnalysisParams;
use crate::cli::{Args, OutputFormat};
use crate::enrich::{EnrichOptions, SpotifyConfig};
use crate::loader::CleanOptions;
use crate::models::{EntityKind, Granularity, IntensityBands};
use crate::report::ReportOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".orpheus.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Spotify enrichment settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "orpheus_report.md".to_string()
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum play count for an obsession.
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// Keep at most this many obsessions per kind. 0 keeps all.
    #[serde(default = "default_top_n", skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,

    /// Entity kinds to rank.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<EntityKind>,

    /// Calendar bucket size for the histogram.
    #[serde(default)]
    pub granularity: Granularity,

    /// Drop rows missing a track or artist name.
    #[serde(default = "default_true")]
    pub drop_incomplete: bool,

    /// Intensity labels for obsessions.
    #[serde(default)]
    pub bands: IntensityBands,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            top_n: default_top_n(),
            kinds: default_kinds(),
            granularity: Granularity::default(),
            drop_incomplete: true,
            bands: IntensityBands::default(),
        }
    }
}

fn default_threshold() -> usize {
    10
}

fn default_top_n() -> Option<usize> {
    Some(10)
}

fn default_kinds() -> Vec<EntityKind> {
    vec![EntityKind::Artist, EntityKind::Track, EntityKind::Album]
}

/// Spotify Web API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Enrich on every run, not just with --enrich.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Track ids per request (max 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Requests in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token_url: default_token_url(),
            api_url: default_api_url(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout(),
            client_id: None,
            client_secret: None,
        }
    }
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    2
}

fn default_timeout() -> u64 {
    30
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Draw text bar charts in the Markdown report.
    #[serde(default = "default_true")]
    pub include_charts: bool,

    /// Width of the longest chart bar in characters.
    #[serde(default = "default_chart_width")]
    pub chart_width: usize,

    /// Entries in each "top" list.
    #[serde(default = "default_top_list_len")]
    pub top_list_len: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_charts: true,
            chart_width: default_chart_width(),
            top_list_len: default_top_list_len(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_chart_width() -> usize {
    30
}

fn default_top_list_len() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(threshold) = args.threshold {
            self.analysis.threshold = threshold;
        }
        if let Some(top_n) = args.top_n {
            self.analysis.top_n = Some(top_n);
        }
        if let Some(kinds) = args.kinds() {
            self.analysis.kinds = kinds;
        }
        if let Some(granularity) = args.granularity {
            self.analysis.granularity = granularity.into();
        }
        if args.keep_incomplete {
            self.analysis.drop_incomplete = false;
        }

        if args.enrich {
            self.enrichment.enabled = true;
        }
        if let Some(size) = args.batch_size {
            self.enrichment.batch_size = size;
        }
        if args.spotify_client_id.is_some() {
            self.enrichment.client_id = args.spotify_client_id.clone();
        }
        if args.spotify_client_secret.is_some() {
            self.enrichment.client_secret = args.spotify_client_secret.clone();
        }

        if args.no_charts {
            self.report.include_charts = false;
        }
    }

    /// Log level from the merged settings; `quiet` wins over `verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            drop_incomplete: self.analysis.drop_incomplete,
        }
    }

    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            threshold: self.analysis.threshold,
            top_n: self.analysis.top_n.filter(|&n| n > 0),
            kinds: self.analysis.kinds.clone(),
            granularity: self.analysis.granularity,
            bands: self.analysis.bands.clone(),
            top_list_len: self.report.top_list_len,
        }
    }

    pub fn spotify_config(&self) -> SpotifyConfig {
        SpotifyConfig {
            client_id: self.enrichment.client_id.clone(),
            client_secret: self.enrichment.client_secret.clone(),
            token_url: self.enrichment.token_url.clone(),
            api_url: self.enrichment.api_url.clone(),
            timeout_seconds: self.enrichment.timeout_seconds,
        }
    }

    pub fn enrich_options(&self, show_progress: bool) -> EnrichOptions {
        EnrichOptions {
            batch_size: self.enrichment.batch_size,
            concurrency: self.enrichment.concurrency,
            show_progress,
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            include_charts: self.report.include_charts,
            chart_width: self.report.chart_width,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BandBasis;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "orpheus_report.md");
        assert_eq!(config.analysis.threshold, 10);
        assert_eq!(config.analysis.top_n, Some(10));
        assert_eq!(config.analysis.granularity, Granularity::Month);
        assert_eq!(config.enrichment.batch_size, 50);
        assert!(!config.enrichment.enabled);
        assert!(config.report.include_charts);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.json"
verbose = true
format = "json"

[analysis]
threshold = 3
kinds = ["artist"]
granularity = "week"

[analysis.bands]
basis = "count"

[[analysis.bands.bands]]
label = "Heavy"
min = 5.0

[[analysis.bands.bands]]
label = "Light"
min = 0.0

[enrichment]
batch_size = 100
client_id = "abc"

[report]
chart_width = 40
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.json");
        assert!(config.general.verbose);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.analysis.threshold, 3);
        assert_eq!(config.analysis.top_n, Some(10));
        assert_eq!(config.analysis.kinds, vec![EntityKind::Artist]);
        assert_eq!(config.analysis.granularity, Granularity::Week);
        assert_eq!(config.analysis.bands.basis, BandBasis::Count);
        assert_eq!(config.analysis.bands.bands.len(), 2);
        assert_eq!(config.enrichment.batch_size, 100);
        assert_eq!(config.enrichment.client_id.as_deref(), Some("abc"));
        assert_eq!(config.report.chart_width, 40);
        assert!(config.report.include_charts);
    }

    #[test]
    fn test_merge_only_overrides_given_flags() {
        let mut config: Config = toml::from_str("[analysis]\nthreshold = 3\n").unwrap();
        let args = Args::try_parse_from([
            "orpheus",
            "--input",
            "x.csv",
            "--granularity",
            "year",
            "--keep-incomplete",
            "--no-charts",
        ])
        .unwrap();

        config.merge_with_args(&args);

        assert_eq!(config.analysis.threshold, 3);
        assert_eq!(config.analysis.granularity, Granularity::Year);
        assert!(!config.analysis.drop_incomplete);
        assert!(!config.report.include_charts);
        assert_eq!(config.general.format, OutputFormat::Markdown);

        let params = config.analysis_params();
        assert_eq!(params.threshold, 3);
        assert_eq!(params.top_list_len, 10);
        assert!(!config.clean_options().drop_incomplete);
    }

    #[test]
    fn test_zero_top_n_keeps_everything() {
        let config: Config = toml::from_str("[analysis]\ntop_n = 0\n").unwrap();
        assert_eq!(config.analysis_params().top_n, None);

        let config: Config = toml::from_str("[analysis]\ntop_n = 3\n").unwrap();
        assert_eq!(config.analysis_params().top_n, Some(3));

        let mut config = Config::default();
        let args = Args::try_parse_from(["orpheus", "--input", "x.csv", "--top-n", "0"]).unwrap();
        config.merge_with_args(&args);
        assert_eq!(config.analysis_params().top_n, None);
    }

    #[test]
    fn test_log_level_from_config() {
        let mut config = Config::default();
        assert_eq!(config.log_level(false), tracing::Level::INFO);

        // verbose set in the file alone is enough
        config.general.verbose = true;
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);

        let mut config = Config::default();
        let args = Args::try_parse_from(["orpheus", "--input", "x.csv", "-v"]).unwrap();
        config.merge_with_args(&args);
        assert_eq!(config.log_level(args.quiet), tracing::Level::DEBUG);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[enrichment]"));
        assert!(toml_str.contains("[report]"));

        // the generated file parses back to the defaults
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analysis.threshold, 10);
        assert_eq!(parsed.analysis.bands, IntensityBands::default());
    }
}
