//! Markdown report generation.
//!
//! This module renders a listening report as Markdown, with plain-text bar
//! charts for the count tables, or as pretty-printed JSON.

use crate::models::{
    CleanReport, DiscoveryTimeline, DiversityMetrics, EntityCount, FeatureSummary,
    HourlyDistribution, ObsessionGroup, Report, ReportMetadata, SchemaCheck, SummaryStats,
    TemporalHistogram, TopList, WeekdayDistribution,
};
use anyhow::Result;

const BAR_CHAR: char = '█';

/// Presentation settings for the Markdown report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub include_charts: bool,
    /// Width in characters of the longest bar.
    pub chart_width: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_charts: true,
            chart_width: 30,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportOptions) -> String {
    let analysis = &report.analysis;
    let mut output = String::new();

    // Title
    output.push_str("# Orpheus Listening Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(&analysis.summary));
    output.push_str(&generate_cleaning_section(&report.cleaning, &report.schema));
    output.push_str(&generate_obsessions_section(&analysis.obsessions));
    output.push_str(&generate_top_section(&analysis.top_entities, options));
    output.push_str(&generate_playlists_section(&analysis.playlists));
    output.push_str(&generate_temporal_section(&analysis.temporal, options));
    output.push_str(&generate_weekday_section(&analysis.weekdays, options));
    output.push_str(&generate_hours_section(&analysis.hours, options));
    output.push_str(&generate_diversity_section(&analysis.diversity));
    output.push_str(&generate_discovery_section(&analysis.discovery));
    output.push_str(&generate_features_section(&analysis.features));

    output.push_str(&generate_footer());

    output
}

/// Render one bar scaled against `max`.
///
/// Non-zero counts always get at least one block so small buckets stay
/// visible next to a dominant one.
pub fn text_bar(count: usize, max: usize, width: usize) -> String {
    if count == 0 || max == 0 || width == 0 {
        return String::new();
    }
    let len = ((count as f64 / max as f64) * width as f64).round() as usize;
    BAR_CHAR.to_string().repeat(len.clamp(1, width))
}

/// Render labelled rows as a fenced text chart.
fn text_chart(rows: &[(String, usize)], width: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let max = rows.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

    let mut chart = String::from("```text\n");
    for (label, count) in rows {
        chart.push_str(&format!(
            "{:<label_width$} | {} {}\n",
            label,
            text_bar(*count, max, width),
            count,
            label_width = label_width
        ));
    }
    chart.push_str("```\n\n");

    chart
}

/// Make free text safe inside a Markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn anchor(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    for source in &metadata.sources {
        section.push_str(&format!("- **Source:** `{}`\n", source));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Records Analyzed:** {}\n",
        metadata.records_analyzed
    ));
    if metadata.records_enriched > 0 {
        section.push_str(&format!(
            "- **Records Enriched:** {}\n",
            metadata.records_enriched
        ));
    }
    section.push_str(&format!(
        "- **Obsession Threshold:** {}\n",
        metadata.threshold
    ));
    if let Some(top_n) = metadata.top_n {
        section.push_str(&format!("- **Top N:** {}\n", top_n));
    }
    section.push_str(&format!("- **Granularity:** {}\n", metadata.granularity));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    for title in [
        "Metadata",
        "Summary",
        "Data Cleaning",
        "Obsessions",
        "Top Entities",
        "Playlists",
        "Listening Over Time",
        "Weekdays",
        "Hours",
        "Diversity",
        "Discovery",
    ] {
        toc.push_str(&format!("- [{}](#{})\n", title, anchor(title)));
    }

    if !report.analysis.features.stats.is_empty() {
        toc.push_str("- [Audio Features](#audio-features)\n");
    }

    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(summary: &SummaryStats) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|:---|\n");
    section.push_str(&format!("| Total Tracks | {} |\n", summary.total_records));
    section.push_str(&format!("| Unique Artists | {} |\n", summary.unique_artists));
    section.push_str(&format!("| Unique Tracks | {} |\n", summary.unique_tracks));
    section.push_str(&format!("| Unique Albums | {} |\n", summary.unique_albums));

    if let Some(span) = &summary.date_span {
        section.push_str(&format!(
            "| Date Range | {} to {} ({} days) |\n",
            span.earliest.format("%Y-%m-%d"),
            span.latest.format("%Y-%m-%d"),
            span.span_days
        ));
    }
    if let Some(popularity) = summary.mean_popularity {
        section.push_str(&format!("| Average Popularity | {:.1} |\n", popularity));
    }
    if let Some(artist) = &summary.most_common_artist {
        section.push_str(&format!("| Most Common Artist | {} |\n", cell(artist)));
    }
    if let Some(album) = &summary.most_common_album {
        section.push_str(&format!("| Most Common Album | {} |\n", cell(album)));
    }
    section.push('\n');

    section
}

/// Generate the cleaning and schema notes.
fn generate_cleaning_section(cleaning: &CleanReport, schema: &[SchemaCheck]) -> String {
    let mut section = String::new();

    section.push_str("## Data Cleaning\n\n");
    section.push_str(&format!(
        "- {} raw rows, {} kept\n",
        cleaning.raw_rows, cleaning.kept
    ));
    section.push_str(&format!(
        "- {} duplicate rows removed\n",
        cleaning.duplicates_removed
    ));
    section.push_str(&format!(
        "- {} rows missing a track or artist removed\n",
        cleaning.incomplete_removed
    ));
    if cleaning.unparseable_dates > 0 {
        section.push_str(&format!(
            "- {} unparseable dates treated as missing\n",
            cleaning.unparseable_dates
        ));
    }
    section.push('\n');

    for check in schema.iter().filter(|c| !c.is_valid || !c.extra_columns.is_empty()) {
        section.push_str(&format!("**`{}`**\n\n", check.source));
        if !check.missing_columns.is_empty() {
            section.push_str(&format!(
                "- Missing columns: {}\n",
                check.missing_columns.join(", ")
            ));
        }
        if !check.extra_columns.is_empty() {
            section.push_str(&format!(
                "- Extra columns: {}\n",
                check.extra_columns.join(", ")
            ));
        }
        for rec in &check.recommendations {
            section.push_str(&format!("> {}\n", rec));
        }
        section.push('\n');
    }

    section
}

/// Generate the obsessions section.
fn generate_obsessions_section(groups: &[ObsessionGroup]) -> String {
    let mut section = String::new();

    section.push_str("## Obsessions\n\n");

    for group in groups {
        section.push_str(&format!("### {}\n\n", group.kind.plural()));

        if group.entries.is_empty() {
            section.push_str(&format!(
                "No obsessions found at threshold {}.\n\n",
                group.threshold
            ));
            continue;
        }

        section.push_str(&format!("| {} | Count | Share | Intensity |\n", group.kind));
        section.push_str("|:---|:---:|:---:|:---|\n");
        for entry in &group.entries {
            section.push_str(&format!(
                "| {} | {} | {:.1}% | {} |\n",
                cell(&entry.name),
                entry.count,
                entry.percentage,
                entry.intensity.as_deref().unwrap_or("-")
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the top lists.
fn generate_top_section(lists: &[TopList], options: &ReportOptions) -> String {
    let mut section = String::new();

    section.push_str("## Top Entities\n\n");

    for list in lists {
        section.push_str(&format!("### Top {}\n\n", list.kind.plural()));

        if list.entries.is_empty() {
            section.push_str("No data.\n\n");
            continue;
        }

        if options.include_charts {
            let rows: Vec<(String, usize)> = list
                .entries
                .iter()
                .map(|e| (e.name.clone(), e.count))
                .collect();
            section.push_str(&text_chart(&rows, options.chart_width));
        } else {
            for (i, entry) in list.entries.iter().enumerate() {
                section.push_str(&format!("{}. {} ({})\n", i + 1, entry.name, entry.count));
            }
            section.push('\n');
        }
    }

    section
}

/// Generate the playlist table.
fn generate_playlists_section(playlists: &[EntityCount]) -> String {
    let mut section = String::new();

    section.push_str("## Playlists\n\n");

    if playlists.is_empty() {
        section.push_str("No data.\n\n");
        return section;
    }

    section.push_str("| Playlist | Tracks |\n");
    section.push_str("|:---|:---:|\n");
    for playlist in playlists {
        section.push_str(&format!("| {} | {} |\n", cell(&playlist.name), playlist.count));
    }
    section.push('\n');

    section
}

/// Generate the temporal histogram.
fn generate_temporal_section(histogram: &TemporalHistogram, options: &ReportOptions) -> String {
    let mut section = String::new();

    section.push_str("## Listening Over Time\n\n");

    if histogram.buckets.is_empty() {
        section.push_str("No dated records.\n\n");
        return section;
    }

    section.push_str(&format!("Tracks added per {}.\n\n", histogram.granularity));

    let rows: Vec<(String, usize)> = histogram
        .counts()
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();

    if options.include_charts {
        section.push_str(&text_chart(&rows, options.chart_width));
    } else {
        section.push_str(&format!("| {} | Tracks |\n", histogram.granularity));
        section.push_str("|:---|:---:|\n");
        for (label, count) in &rows {
            section.push_str(&format!("| {} | {} |\n", label, count));
        }
        section.push('\n');
    }

    if let Some(peak) = &histogram.peak {
        section.push_str(&format!(
            "- **Peak:** {} ({} tracks)\n",
            peak.label, peak.count
        ));
    }
    if let Some(avg) = histogram.average_per_bucket {
        section.push_str(&format!("- **Average:** {:.1} per {}\n", avg, histogram.granularity));
    }
    if histogram.excluded > 0 {
        section.push_str(&format!(
            "- {} records without a date were left out\n",
            histogram.excluded
        ));
    }
    section.push('\n');

    section
}

/// Generate the weekday chart.
fn generate_weekday_section(weekdays: &WeekdayDistribution, options: &ReportOptions) -> String {
    let mut section = String::new();

    section.push_str("## Weekdays\n\n");

    let Some(peak) = weekdays.peak else {
        section.push_str("No dated records.\n\n");
        return section;
    };

    if options.include_charts {
        let rows: Vec<(String, usize)> = weekdays
            .counts
            .iter()
            .map(|(day, count)| (day.to_string(), *count))
            .collect();
        section.push_str(&text_chart(&rows, options.chart_width));
    }

    section.push_str(&format!("Most tracks were added on **{}**.\n\n", peak));

    section
}

/// Generate the hour-of-day chart.
fn generate_hours_section(hours: &HourlyDistribution, options: &ReportOptions) -> String {
    let mut section = String::new();

    section.push_str("## Hours\n\n");

    let Some(peak) = hours.peak else {
        section.push_str("No dated records.\n\n");
        return section;
    };

    if options.include_charts {
        let rows: Vec<(String, usize)> = hours
            .counts
            .iter()
            .map(|(hour, count)| (format!("{:02}:00", hour), *count))
            .collect();
        section.push_str(&text_chart(&rows, options.chart_width));
    }

    section.push_str(&format!(
        "Most tracks were added around **{:02}:00** UTC.\n\n",
        peak
    ));

    section
}

/// Generate the diversity section.
fn generate_diversity_section(diversity: &DiversityMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Diversity\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|:---|\n");
    section.push_str(&format!("| Unique Artists | {} |\n", diversity.unique_artists));
    if let Some(simpson) = diversity.simpson_index {
        section.push_str(&format!("| Simpson Index | {:.3} |\n", simpson));
    }
    if let Some(share) = diversity.most_common_artist_share {
        section.push_str(&format!(
            "| Top Artist Share | {:.1}% |\n",
            share * 100.0
        ));
    }
    if let Some(share) = diversity.top_10_artist_share {
        section.push_str(&format!(
            "| Top 10 Artists Share | {:.1}% |\n",
            share * 100.0
        ));
    }
    section.push_str(&format!("| Unique Albums | {} |\n", diversity.unique_albums));
    section.push_str(&format!(
        "| Single-Track Albums | {} |\n",
        diversity.single_track_albums
    ));
    section.push('\n');

    section
}

/// Generate the discovery timeline.
fn generate_discovery_section(discovery: &DiscoveryTimeline) -> String {
    let mut section = String::new();

    section.push_str("## Discovery\n\n");

    if discovery.years.is_empty() {
        section.push_str("No dated records.\n\n");
        return section;
    }

    section.push_str("| Year | New Artists | Examples |\n");
    section.push_str("|:---|:---:|:---|\n");
    for year in &discovery.years {
        let examples: Vec<String> = year.artists.iter().take(3).map(|a| cell(a)).collect();
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            year.year,
            year.artists.len(),
            examples.join(", ")
        ));
    }
    section.push_str(&format!(
        "\n{} artists discovered across {} years.\n\n",
        discovery.total_artists(),
        discovery.years.len()
    ));

    section
}

/// Generate the audio-feature section.
fn generate_features_section(features: &FeatureSummary) -> String {
    if features.stats.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Audio Features\n\n");
    section.push_str("| Feature | Samples | Mean | Std | Min | Median | Max |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    for stat in &features.stats {
        let std = stat
            .std
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        section.push_str(&format!(
            "| {} | {} | {:.3} | {} | {:.3} | {:.3} | {:.3} |\n",
            stat.feature, stat.samples, stat.mean, std, stat.min, stat.median, stat.max
        ));
    }
    section.push('\n');

    if let Some(sentiment) = &features.sentiment {
        section.push_str(&format!(
            "Sentiment: {} positive, {} neutral, {} negative.\n\n",
            sentiment.positive, sentiment.neutral, sentiment.negative
        ));
    }

    for note in &features.notes {
        section.push_str(&format!("> {}\n", note));
    }
    if !features.notes.is_empty() {
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by Orpheus*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
