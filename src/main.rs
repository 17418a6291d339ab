//! Orpheus - listening-pattern analyzer for Spotify playlist exports
//!
//! A CLI tool that loads Exportify CSV exports, optionally enriches them
//! with Spotify audio features, and reports repeat obsessions, listening
//! rhythms and collection diversity.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input, unreadable export, config, etc.)

mod analysis;
mod cli;
mod config;
mod enrich;
mod error;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use enrich::SpotifyClient;
use loader::LoadedDataset;
use models::{Feature, ListeningRecord, PatternAnalysis, Report, ReportMetadata};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(args.quiet));

    info!("Orpheus v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Input: {:?}, analysis settings: {:?}",
        args.input, config.analysis
    );

    match run_analysis(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .orpheus.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize thresholds, intensity bands, enrichment, and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Where status lines go.
///
/// They move to stderr when the report itself is written to stdout.
#[derive(Debug, Clone, Copy)]
struct Console {
    report_on_stdout: bool,
}

impl Console {
    fn for_destination(destination: &Path) -> Self {
        Self {
            report_on_stdout: destination == Path::new("-"),
        }
    }

    fn say(&self, line: impl Display) {
        if self.report_on_stdout {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Run the complete load, enrich, analyze and report workflow.
async fn run_analysis(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let input = args
        .input
        .clone()
        .context("An --input path is required")?;

    let destination = output_path(&config, args.output.is_some());
    let console = Console::for_destination(&destination);

    // Step 1: Load and clean the exports
    console.say(format!("📂 Loading exports from: {}", input.display()));
    let dataset = loader::load_dataset(&input, &config.clean_options())
        .with_context(|| format!("Failed to load {}", input.display()))?;

    if args.dry_run {
        return handle_dry_run(&dataset);
    }

    let LoadedDataset {
        mut records,
        cleaning,
        schema,
        sources,
    } = dataset;

    // Step 2: Optional enrichment
    let records_enriched = if config.enrichment.enabled {
        run_enrichment(&mut records, &config, console, !args.quiet).await
    } else {
        0
    };

    // Step 3: Aggregate
    console.say(format!("🔬 Analyzing {} tracks...", records.len()));
    let params = config.analysis_params();
    let analysis = analysis::analyze(Some(records.as_slice()), &params)?;

    // Step 4: Build and write the report
    console.say("📝 Generating report...");

    let report = Report {
        metadata: ReportMetadata {
            sources,
            generated_at: Utc::now(),
            records_analyzed: records.len(),
            threshold: params.threshold,
            top_n: params.top_n,
            granularity: params.granularity,
            records_enriched,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        cleaning,
        schema,
        analysis,
    };

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, &config.report_options())
        }
    };

    if console.report_on_stdout {
        println!("{}", output);
    } else {
        std::fs::write(&destination, &output)
            .with_context(|| format!("Failed to write report to {}", destination.display()))?;
    }

    for line in summary_lines(&report.analysis) {
        console.say(line);
    }
    console.say(format!(
        "   Duration: {:.1}s",
        start_time.elapsed().as_secs_f64()
    ));
    if !console.report_on_stdout {
        console.say(format!(
            "\n✅ Analysis complete! Report saved to: {}",
            destination.display()
        ));
    }

    Ok(0)
}

/// Resolve where the report goes.
///
/// A JSON report keeps the configured name but swaps a default `.md`
/// extension for `.json` unless the path was given explicitly.
fn output_path(config: &Config, explicit: bool) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    let is_markdown_name = path.extension().is_some_and(|e| e == "md");

    if config.general.format == OutputFormat::Json && !explicit && is_markdown_name {
        path.with_extension("json")
    } else {
        path
    }
}

/// Fetch missing audio features. Returns the number of records enriched.
///
/// Every failure here is logged and skipped so the report still gets built.
async fn run_enrichment(
    records: &mut [ListeningRecord],
    config: &Config,
    console: Console,
    show_progress: bool,
) -> usize {
    let spotify = config.spotify_config();
    if !spotify.has_credentials() {
        warn!("Spotify credentials not configured, skipping enrichment");
        console.say("⚠️  Skipping enrichment: set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET.");
        return 0;
    }

    let without_features = records.iter().filter(|r| r.features.is_empty()).count();
    debug!("{} records carry no audio features yet", without_features);

    console.say("🎧 Fetching audio features from Spotify...");
    let client = match SpotifyClient::connect(&spotify).await {
        Ok(client) => client,
        Err(e) => {
            warn!("Spotify authentication failed: {}", e);
            console.say(format!("⚠️  Skipping enrichment: {}", e));
            return 0;
        }
    };

    let options = config.enrich_options(show_progress);
    let stats = enrich::enrich_records(records, &client, &options).await;

    if stats.failed_batches > 0 {
        console.say(format!(
            "   ⚠️  {} batches failed and were skipped",
            stats.failed_batches
        ));
    }
    console.say(format!(
        "   Enriched {} of {} requested tracks ({} without a Spotify id)",
        stats.enriched, stats.requested, stats.skipped_no_id
    ));

    stats.enriched
}

/// Handle --dry-run: print the cleaning and schema results, exit.
fn handle_dry_run(dataset: &LoadedDataset) -> Result<i32> {
    println!("\n🔍 Dry run: loading and cleaning only (no analysis)...\n");

    let cleaning = &dataset.cleaning;
    println!("   Sources: {}", dataset.sources.len());
    for source in &dataset.sources {
        println!("     📄 {}", source);
    }
    println!("   Raw rows: {}", cleaning.raw_rows);
    println!("   Duplicates removed: {}", cleaning.duplicates_removed);
    println!("   Incomplete rows removed: {}", cleaning.incomplete_removed);
    println!("   Unparseable dates: {}", cleaning.unparseable_dates);
    println!("   Rows kept: {}", cleaning.kept);

    for check in &dataset.schema {
        if check.is_valid {
            println!("\n   ✅ {}: Exportify schema OK", check.source);
        } else {
            println!(
                "\n   ⚠️  {}: missing {}",
                check.source,
                check.missing_columns.join(", ")
            );
        }
        for rec in &check.recommendations {
            println!("      {}", rec);
        }
    }

    println!("\n✅ Dry run complete. No analysis was performed.");
    Ok(0)
}

/// Console summary lines for a finished run.
fn summary_lines(analysis: &PatternAnalysis) -> Vec<String> {
    let mut lines = vec![
        "\n📊 Analysis Summary:".to_string(),
        format!("   Tracks: {}", analysis.summary.total_records),
        format!(
            "   Artists: {} | Albums: {}",
            analysis.summary.unique_artists, analysis.summary.unique_albums
        ),
    ];

    for group in &analysis.obsessions {
        lines.push(format!(
            "   {} obsessions (≥{} plays): {}",
            group.kind,
            group.threshold,
            group.entries.len()
        ));
    }

    if let Some(peak) = &analysis.temporal.peak {
        lines.push(format!(
            "   Busiest {}: {} ({} tracks)",
            analysis.temporal.granularity, peak.label, peak.count
        ));
    }

    if let Some(hour) = analysis.hours.peak {
        lines.push(format!("   Busiest hour: {:02}:00 UTC", hour));
    }

    let discovered = analysis.discovery.artists_per_year();
    if let Some((year, count)) = discovered.iter().max_by_key(|(_, count)| *count) {
        lines.push(format!(
            "   Biggest discovery year: {} ({} new artists)",
            year, count
        ));
    }

    if let Some(valence) = analysis.features.mean_of(Feature::Valence) {
        lines.push(format!("   Average valence: {:.2}", valence));
    }

    lines
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
